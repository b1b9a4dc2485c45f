//! pollsync: terminal client for live polls.
//! Fetches poll snapshots over REST, follows vote deltas over the push
//! channel and submits votes.

use clap::Parser;

mod cli;
mod client;
mod cmd_create;
mod cmd_show;
mod cmd_vote;
mod cmd_watch;
mod config;
mod context;
mod render;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("POLLSYNC_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = config::RuntimeConfig::resolve(&args.backend_url, args.channel_url.as_deref())?;
    let use_color = context::resolve_color(&args.color);
    tracing::debug!(backend = %config.backend_url, channel = %config.channel_url, "configuration resolved");

    match args.command {
        cli::Command::Show(opts) => {
            cmd_show::cmd_show(&config, &opts.code, opts.json, use_color).await?;
        }
        cli::Command::Watch(opts) => {
            cmd_watch::cmd_watch(&config, &opts.code, opts.interval, opts.no_live, use_color).await?;
        }
        cli::Command::Vote(opts) => {
            cmd_vote::cmd_vote(&config, &opts.code, &opts.choices, opts.json, use_color).await?;
        }
        cli::Command::Create(opts) => {
            cmd_create::cmd_create(&config, &opts, use_color).await?;
        }
    }

    Ok(())
}
