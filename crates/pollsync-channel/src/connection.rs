//! Process-wide WebSocket push connection.
//!
//! One connection is started at application start and shared by every poll
//! session. A background task owns the socket: it connects, forwards queued
//! commands, fans inbound `voteUpdate` frames out on a broadcast channel, and
//! reconnects with capped exponential backoff until cancelled.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pollsync_core::types::VoteUpdate;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::ChannelError;
use crate::protocol::{self, ChannelCommand};
use crate::transport::{Link, PushTransport};

const EVENT_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─── Reconnect policy ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures.min(16)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

// ─── Connection ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct WsConnection {
    url: String,
    link: watch::Sender<Link>,
    outbound: mpsc::UnboundedSender<ChannelCommand>,
    events: broadcast::Sender<VoteUpdate>,
    cancel: CancellationToken,
}

impl WsConnection {
    /// Validate `url` and spawn the connection task. The first connect
    /// happens in the background; `is_connected` is false until it succeeds.
    pub fn start(
        url: &str,
        policy: ReconnectPolicy,
        cancel: CancellationToken,
    ) -> Result<(Arc<Self>, JoinHandle<()>), ChannelError> {
        validate_url(url)?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (link, _) = watch::channel(Link::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let conn = Arc::new(Self {
            url: url.to_string(),
            link,
            outbound,
            events,
            cancel,
        });

        let task_conn = Arc::clone(&conn);
        let handle = tokio::spawn(async move {
            task_conn.run(outbound_rx, policy).await;
        });

        Ok((conn, handle))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the connection task; the socket is closed on the way out.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn run(&self, mut outbound: mpsc::UnboundedReceiver<ChannelCommand>, policy: ReconnectPolicy) {
        let mut failures: u32 = 0;

        loop {
            let attempt = tokio::select! {
                res = tokio_tungstenite::connect_async(self.url.as_str()) => res,
                _ = self.cancel.cancelled() => break,
            };

            match attempt {
                Ok((ws, _)) => {
                    failures = 0;
                    // Commands queued for a dead connection are stale; the
                    // session channels replay what they still need.
                    while outbound.try_recv().is_ok() {}
                    self.link.send_modify(|l| {
                        l.generation += 1;
                        l.connected = true;
                    });
                    tracing::info!(url = %self.url, generation = self.generation(), "push channel connected");

                    let result = self.serve(ws, &mut outbound).await;
                    self.link.send_modify(|l| l.connected = false);
                    match result {
                        Ok(()) => tracing::info!(url = %self.url, "push channel disconnected"),
                        Err(e) => tracing::warn!(url = %self.url, error = %e, "push channel dropped"),
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(url = %self.url, failures, error = %e, "push channel connect failed");
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
            let delay = policy.delay(failures);
            tracing::debug!(delay_ms = delay.as_millis() as u64, "push channel reconnect scheduled");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        self.link.send_if_modified(|l| std::mem::replace(&mut l.connected, false));
        tracing::info!(url = %self.url, "push channel stopped");
    }

    async fn serve(
        &self,
        ws: WsStream,
        outbound: &mut mpsc::UnboundedReceiver<ChannelCommand>,
    ) -> Result<(), ChannelError> {
        let (mut sink, mut stream) = ws.split();

        loop {
            // Queued commands go out before a shutdown closes the socket.
            tokio::select! {
                biased;
                cmd = outbound.recv() => {
                    // Sender lives in `self`, so the queue never closes here.
                    let Some(cmd) = cmd else { return Ok(()) };
                    let text = protocol::encode_command(&cmd)?;
                    sink.send(Message::Text(text)).await?;
                    tracing::trace!(event = cmd.event_name(), code = %cmd.code(), "frame sent");
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.dispatch(&text),
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match protocol::decode_event(text) {
            Ok(Some(update)) => {
                // No subscribers is fine: nobody is watching a poll right now.
                let _ = self.events.send(update);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "discarding malformed channel frame"),
        }
    }
}

/// Accept only absolute `ws://` or `wss://` URLs that name a host.
fn validate_url(url: &str) -> Result<(), ChannelError> {
    let invalid = || ChannelError::InvalidUrl(url.to_string());
    let uri: Uri = url.parse().map_err(|_| invalid())?;
    match (uri.scheme_str(), uri.host()) {
        (Some("ws" | "wss"), Some(host)) if !host.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

impl PushTransport for WsConnection {
    fn link(&self) -> Link {
        *self.link.borrow()
    }

    fn on_reconnect(&self) -> watch::Receiver<Link> {
        self.link.subscribe()
    }

    fn send(&self, command: ChannelCommand) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.outbound.send(command).is_ok()
    }

    fn subscribe(&self) -> broadcast::Receiver<VoteUpdate> {
        self.events.subscribe()
    }
}
