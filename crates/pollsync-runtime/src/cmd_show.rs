//! `pollsync show`: fetch a poll once and print it.

use pollsync_channel::SessionChannel;
use pollsync_channel::memory::MemoryTransport;
use pollsync_core::types::PollCode;
use pollsync_session::PollSession;

use crate::client::{HttpApi, load_session};
use crate::config::RuntimeConfig;
use crate::render::format_view;

/// Entry point for `pollsync show`.
pub async fn cmd_show(config: &RuntimeConfig, code: &str, json: bool, use_color: bool) -> anyhow::Result<()> {
    let code = PollCode::parse(code)?;
    let api = HttpApi::new(&config.backend_url)?;
    // Snapshot only: the session never goes live.
    let session = PollSession::open(code, api, SessionChannel::new(MemoryTransport::offline()));
    load_session(&session).await?;

    let Some(view) = session.view() else {
        anyhow::bail!("{}: poll is not loaded", session.code());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", format_view(&view, None, use_color));
    }
    Ok(())
}
