//! Text rendering of a poll view.

use pollsync_core::clock::EXPIRED_LABEL;
use pollsync_core::tally::Outcome;
use pollsync_core::view::{OptionView, PollView};

use crate::context::{BOLD, CYAN, DIM, GREEN, RED, YELLOW, paint};

const BAR_WIDTH: usize = 20;

/// Push channel state shown in the status line. `None` for one-shot output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Offline,
}

pub fn format_view(view: &PollView, liveness: Option<Liveness>, use_color: bool) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{}  {}\n",
        paint(&view.name, BOLD, use_color),
        paint(view.code.as_str(), DIM, use_color)
    ));
    out.push_str(&format!("{}\n", view.question));
    out.push_str(&status_line(view, liveness, use_color));
    out.push_str("\n\n");

    let label_width = view
        .options
        .iter()
        .map(|o| o.label.chars().count())
        .max()
        .unwrap_or(0);

    for option in &view.options {
        let line = if view.show_results {
            result_line(option, label_width, use_color)
        } else {
            choice_line(option, view.allows_multiple)
        };
        out.push_str(&line);
        out.push('\n');
    }

    if view.show_results {
        out.push_str(&format!("\n  Total votes: {}\n", view.total_votes));
        if view.outcome == Some(Outcome::Tie) {
            out.push_str(&format!("  {}\n", paint("Tied for first place", YELLOW, use_color)));
        }
    } else {
        let hint = if view.allows_multiple {
            format!("pollsync vote {} <number>...", view.code)
        } else {
            format!("pollsync vote {} <number>", view.code)
        };
        out.push_str(&format!("\n  {}\n", paint(&format!("Vote with: {hint}"), DIM, use_color)));
    }

    out
}

fn status_line(view: &PollView, liveness: Option<Liveness>, use_color: bool) -> String {
    let time = if view.open {
        paint(&format!("{} left", view.time_remaining.label), GREEN, use_color)
    } else if view.time_remaining.label == EXPIRED_LABEL {
        paint(EXPIRED_LABEL, RED, use_color)
    } else {
        paint("Closed", RED, use_color)
    };

    let mode = if view.allows_multiple {
        "multiple choice"
    } else {
        "single choice"
    };

    let mut parts = vec![time, mode.to_string()];
    if view.has_voted {
        parts.push(paint("voted", CYAN, use_color));
    }
    match liveness {
        Some(Liveness::Live) => parts.push(paint("live", GREEN, use_color)),
        Some(Liveness::Offline) => parts.push(paint("offline", YELLOW, use_color)),
        None => {}
    }
    parts.join(" \u{b7} ")
}

fn choice_line(option: &OptionView, allows_multiple: bool) -> String {
    let mark = match (allows_multiple, option.selected) {
        (true, true) => "[x]",
        (true, false) => "[ ]",
        (false, true) => "(*)",
        (false, false) => "( )",
    };
    format!("  {:>2}. {mark} {}", option.index + 1, option.label)
}

fn result_line(option: &OptionView, label_width: usize, use_color: bool) -> String {
    let pad = label_width.saturating_sub(option.label.chars().count());
    let label = format!("{}{}", option.label, " ".repeat(pad));
    let label = if option.winning {
        paint(&label, BOLD, use_color)
    } else {
        label
    };

    let mut line = format!(
        "  {:>2}. {label}  {}  {:>3}%  ({})",
        option.index + 1,
        bar(option.percentage),
        option.percentage,
        option.votes
    );
    if option.user_vote {
        line.push_str(&format!("  {}", paint("your vote", CYAN, use_color)));
    }
    if option.winning {
        line.push_str(&format!("  {}", paint("winner", YELLOW, use_color)));
    }
    line
}

/// Fixed-width percentage bar, rounded to the nearest cell.
pub fn bar(percentage: u8) -> String {
    let filled = (usize::from(percentage.min(100)) * BAR_WIDTH + 50) / 100;
    format!(
        "{}{}",
        "\u{2588}".repeat(filled),
        "\u{2591}".repeat(BAR_WIDTH - filled)
    )
}
