//! In-process transport with no network behind it.
//!
//! Used for snapshot-only sessions (`pollsync show`, `--no-live`) and as
//! the loopback transport in tests: it records every command it accepts and
//! lets the caller inject updates and connectivity changes.

use std::sync::Mutex;

use pollsync_core::types::VoteUpdate;
use tokio::sync::{broadcast, watch};

use crate::protocol::ChannelCommand;
use crate::transport::{Link, PushTransport};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct MemoryTransport {
    link: watch::Sender<Link>,
    sent: Mutex<Vec<ChannelCommand>>,
    events: broadcast::Sender<VoteUpdate>,
}

impl MemoryTransport {
    /// A transport that never connects: every command is dropped.
    pub fn offline() -> Self {
        let (link, _) = watch::channel(Link::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            link,
            sent: Mutex::new(Vec::new()),
            events,
        }
    }

    /// A transport that is already connected (generation 1).
    pub fn connected() -> Self {
        let transport = Self::offline();
        transport.reconnect();
        transport
    }

    pub fn disconnect(&self) {
        self.link.send_modify(|l| l.connected = false);
    }

    /// Mark connected and start a new generation.
    pub fn reconnect(&self) {
        self.link.send_modify(|l| {
            l.generation += 1;
            l.connected = true;
        });
    }

    /// Deliver `update` to every subscriber. Returns the receiver count.
    pub fn push(&self, update: VoteUpdate) -> usize {
        self.events.send(update).unwrap_or(0)
    }

    /// Commands accepted while connected, in order.
    pub fn sent(&self) -> Vec<ChannelCommand> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl PushTransport for MemoryTransport {
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
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command);
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<VoteUpdate> {
        self.events.subscribe()
    }
}
