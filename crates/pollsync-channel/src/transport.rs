//! Capability the session channel needs from the shared push connection.

use std::sync::Arc;

use pollsync_core::types::VoteUpdate;
use tokio::sync::{broadcast, watch};

use crate::protocol::ChannelCommand;

/// Connection state published as one value, so the connected flag and the
/// generation it belongs to are always read together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    /// Increases on every (re-)established connection; 0 before the first.
    pub generation: u64,
    pub connected: bool,
}

/// A long-lived push connection shared by every poll session in the process.
///
/// Connecting and reconnecting belong to the implementor. Consumers only see
/// the current [`Link`] and fire-and-forget `send`.
pub trait PushTransport: Send + Sync + 'static {
    fn link(&self) -> Link;

    fn is_connected(&self) -> bool {
        self.link().connected
    }

    /// Generation of the current connection; 0 before the first connect.
    fn generation(&self) -> u64 {
        self.link().generation
    }

    /// Watch that yields the link after every connect and disconnect.
    fn on_reconnect(&self) -> watch::Receiver<Link>;

    /// Queue `command` on the live connection. Returns `false` when it was
    /// dropped because no connection is established.
    fn send(&self, command: ChannelCommand) -> bool;

    /// Inbound vote updates for every poll this connection has joined.
    fn subscribe(&self) -> broadcast::Receiver<VoteUpdate>;
}

impl<T: PushTransport> PushTransport for Arc<T> {
    fn link(&self) -> Link {
        (**self).link()
    }

    fn on_reconnect(&self) -> watch::Receiver<Link> {
        (**self).on_reconnect()
    }

    fn send(&self, command: ChannelCommand) -> bool {
        (**self).send(command)
    }

    fn subscribe(&self) -> broadcast::Receiver<VoteUpdate> {
        (**self).subscribe()
    }
}
