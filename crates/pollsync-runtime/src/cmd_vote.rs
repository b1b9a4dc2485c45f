//! `pollsync vote`: select options and submit a vote.

use pollsync_channel::SessionChannel;
use pollsync_channel::memory::MemoryTransport;
use pollsync_core::PollError;
use pollsync_core::types::PollCode;
use pollsync_session::{PollSession, SessionPhase};

use crate::client::{HttpApi, SUBMIT_FAILED, load_session};
use crate::config::RuntimeConfig;
use crate::context::{GREEN, paint};
use crate::render::format_view;

/// Entry point for `pollsync vote`.
pub async fn cmd_vote(
    config: &RuntimeConfig,
    code: &str,
    choices: &[usize],
    json: bool,
    use_color: bool,
) -> anyhow::Result<()> {
    let code = PollCode::parse(code)?;
    let api = HttpApi::new(&config.backend_url)?;
    let session = PollSession::open(code, api, SessionChannel::new(MemoryTransport::offline()));
    load_session(&session).await?;

    let Some(poll) = session.poll() else {
        anyhow::bail!("{}: poll is not loaded", session.code());
    };
    if session.phase() == SessionPhase::ReadyVoted {
        anyhow::bail!("{}: {}", session.code(), PollError::AlreadyVoted);
    }

    let indices = resolve_choices(choices, poll.option_count(), poll.allows_multiple)?;
    for index in indices {
        session.select(index);
    }

    match session.submit().await {
        Ok(tally) => {
            tracing::info!(code = %session.code(), total_votes = tally.total_votes, "vote recorded");
        }
        Err(e) => {
            let message = session
                .last_error()
                .unwrap_or_else(|| e.user_message(SUBMIT_FAILED));
            anyhow::bail!("{}: {message}", session.code());
        }
    }

    let Some(view) = session.view() else {
        anyhow::bail!("{}: poll is not loaded", session.code());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("{}", paint("Vote recorded.", GREEN, use_color));
        print!("{}", format_view(&view, None, use_color));
    }
    Ok(())
}

/// Turn 1-based CLI option numbers into distinct 0-based indices.
pub(crate) fn resolve_choices(
    choices: &[usize],
    option_count: usize,
    allows_multiple: bool,
) -> anyhow::Result<Vec<usize>> {
    let mut indices: Vec<usize> = Vec::with_capacity(choices.len());
    for &number in choices {
        if number == 0 || number > option_count {
            anyhow::bail!("option {number} does not exist (choose 1 to {option_count})");
        }
        let index = number - 1;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    if indices.is_empty() {
        anyhow::bail!("Select at least one option");
    }
    if !allows_multiple && indices.len() > 1 {
        anyhow::bail!("this poll accepts a single choice");
    }
    Ok(indices)
}
