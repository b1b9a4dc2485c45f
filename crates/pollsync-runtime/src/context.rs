//! Terminal helpers: color resolution and ANSI styling.

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[1;33m";
pub const RED: &str = "\x1b[31m";
pub const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Resolve --color flag to bool.
pub fn resolve_color(color: &str) -> bool {
    use std::io::IsTerminal;
    match color {
        "always" => true,
        "never" => false,
        _ => std::io::stdout().is_terminal(),
    }
}

/// Wrap `text` in `style` when color is on.
pub fn paint(text: &str, style: &str, use_color: bool) -> String {
    if use_color {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Clear screen + cursor home.
pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
}
