//! `pollsync create`: validate and submit a new poll.

use pollsync_core::types::CreatePollRequest;

use crate::cli::CreateOpts;
use crate::client::{CREATE_FAILED, HttpApi};
use crate::config::RuntimeConfig;
use crate::context::{BOLD, paint};

/// Entry point for `pollsync create`.
pub async fn cmd_create(config: &RuntimeConfig, opts: &CreateOpts, use_color: bool) -> anyhow::Result<()> {
    let request = CreatePollRequest::new(
        &opts.name,
        &opts.question,
        &opts.answers,
        opts.multiple,
        opts.duration,
    )?;

    let api = HttpApi::new(&config.backend_url)?;
    let code = api
        .create_poll(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message(CREATE_FAILED)))?;

    tracing::info!(code = %code, "poll created");
    println!("Poll created: {}", paint(code.as_str(), BOLD, use_color));
    println!("Share the code, or follow it with: pollsync watch {code}");
    Ok(())
}
