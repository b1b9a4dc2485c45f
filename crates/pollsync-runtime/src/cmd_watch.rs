//! `pollsync watch`: live-refresh view of one poll.
//!
//! Redraws on every session change (snapshot, delta, vote) and once per
//! interval so the countdown keeps moving. Ctrl-C leaves the poll's channel
//! before the push connection is shut down.

use std::sync::Arc;
use std::time::Duration;

use pollsync_channel::connection::{ReconnectPolicy, WsConnection};
use pollsync_channel::memory::MemoryTransport;
use pollsync_channel::{PushTransport, SessionChannel};
use pollsync_core::PollError;
use pollsync_core::types::PollCode;
use pollsync_session::{PollApi, PollSession, SessionPhase};
use tokio_util::sync::CancellationToken;

use crate::client::{FETCH_FAILED, HttpApi};
use crate::config::RuntimeConfig;
use crate::context::{DIM, RED, clear_screen, paint};
use crate::render::{Liveness, format_view};

/// Entry point for `pollsync watch`.
pub async fn cmd_watch(
    config: &RuntimeConfig,
    code: &str,
    interval: u64,
    no_live: bool,
    use_color: bool,
) -> anyhow::Result<()> {
    let code = PollCode::parse(code)?;
    let api = HttpApi::new(&config.backend_url)?;
    let interval = Duration::from_secs(interval.max(1));

    // Ctrl-C only stops the loop; the push connection is shut down after
    // the session has queued its leave.
    let stop = CancellationToken::new();
    let watcher = stop.clone();
    tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    watcher.cancel();
                }
            }
            _ = watcher.cancelled() => {}
        }
    });
    let _stop_on_exit = stop.clone().drop_guard();

    if no_live {
        let session = PollSession::open(code, api, SessionChannel::new(MemoryTransport::offline()));
        return watch_loop(&session, interval, false, use_color, &stop).await;
    }

    let cancel = CancellationToken::new();
    let (conn, handle) = WsConnection::start(&config.channel_url, ReconnectPolicy::default(), cancel)?;
    let session = PollSession::open(code, api, SessionChannel::new(Arc::clone(&conn)));

    let result = watch_loop(&session, interval, true, use_color, &stop).await;

    // Leave is queued before the connection closes.
    session.close();
    conn.shutdown();
    if let Err(e) = handle.await {
        tracing::warn!(error = %e, "push connection task failed");
    }
    result
}

async fn watch_loop<A: PollApi, T: PushTransport>(
    session: &PollSession<A, T>,
    interval: Duration,
    live: bool,
    use_color: bool,
    stop: &CancellationToken,
) -> anyhow::Result<()> {
    let mut changes = session.changes();
    let mut ticker = tokio::time::interval(interval);

    loop {
        if session.phase() == SessionPhase::Loading || session.phase() == SessionPhase::Error {
            let loaded = tokio::select! {
                res = session.load() => res,
                _ = stop.cancelled() => {
                    tracing::debug!(code = %session.code(), "stopped while loading");
                    break;
                }
            };
            match loaded {
                Ok(_) => {}
                Err(e @ PollError::NotFound { .. }) => {
                    anyhow::bail!("{}: {}", session.code(), e.user_message(FETCH_FAILED));
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(code = %session.code(), error = %e, "load failed, retrying");
                }
                Err(e) => {
                    anyhow::bail!("{}: {}", session.code(), e.user_message(FETCH_FAILED));
                }
            }
            changes.borrow_and_update();
        }

        redraw(session, live, use_color);

        tokio::select! {
            _ = ticker.tick() => {}
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = stop.cancelled() => { break; }
        }
    }

    Ok(())
}

fn redraw<A: PollApi, T: PushTransport>(session: &PollSession<A, T>, live: bool, use_color: bool) {
    clear_screen();

    match session.view() {
        Some(view) => {
            let liveness = match (live, session.is_live()) {
                (false, _) => None,
                (true, true) => Some(Liveness::Live),
                (true, false) => Some(Liveness::Offline),
            };
            print!("{}", format_view(&view, liveness, use_color));
        }
        None => {
            let message = session
                .last_error()
                .unwrap_or_else(|| "Loading...".to_string());
            println!("{}  {}", session.code(), paint(&message, RED, use_color));
        }
    }

    println!(
        "\n{}",
        paint(&format!("pollsync watch {} \u{b7} Ctrl-C to quit", session.code()), DIM, use_color)
    );
}
