//! CLI definition using clap derive.

use clap::{Args, Parser, Subcommand};
use pollsync_core::types::DEFAULT_DURATION_HOURS;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3000";

#[derive(Parser)]
#[command(name = "pollsync", version, about = "Join, watch and vote on live polls")]
pub struct Cli {
    /// Base URL of the poll REST API
    #[arg(long, global = true, env = "POLLSYNC_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Push channel URL (default: backend URL with ws scheme and /ws path)
    #[arg(long, global = true, env = "POLLSYNC_CHANNEL_URL")]
    pub channel_url: Option<String>,

    /// Color output: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_parser = ["auto", "always", "never"])]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch a poll once and print it
    Show(ShowOpts),
    /// Follow a poll live until Ctrl-C
    Watch(WatchOpts),
    /// Cast a vote
    Vote(VoteOpts),
    /// Create a new poll and print its code
    Create(CreateOpts),
}

#[derive(Args)]
pub struct ShowOpts {
    /// Poll code
    pub code: String,

    /// Print the derived view as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct WatchOpts {
    /// Poll code
    pub code: String,

    /// Redraw interval in seconds for the countdown
    #[arg(long, default_value = "1")]
    pub interval: u64,

    /// Skip the push channel and only show the snapshot countdown
    #[arg(long)]
    pub no_live: bool,
}

#[derive(Args)]
pub struct VoteOpts {
    /// Poll code
    pub code: String,

    /// Option numbers as listed by `show` (1-based)
    #[arg(required = true)]
    pub choices: Vec<usize>,

    /// Print the resulting view as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CreateOpts {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub question: String,

    /// Answer text; repeat for each option
    #[arg(long = "answer", required = true)]
    pub answers: Vec<String>,

    /// Allow participants to pick more than one answer
    #[arg(long)]
    pub multiple: bool,

    /// Hours until the poll closes
    #[arg(long, default_value_t = DEFAULT_DURATION_HOURS)]
    pub duration: u32,
}
