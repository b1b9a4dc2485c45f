//! Session channel: one poll code's membership on the shared push connection.
//!
//! Membership rules:
//! - `join` is idempotent per code and per connection generation.
//! - `join` for a different code leaves the previous one first.
//! - `leave` is idempotent and a no-op when nothing was joined.
//! - While offline, `join` only records the desired code; `rejoin` emits it
//!   once the connection comes back.

use std::sync::Mutex;

use pollsync_core::types::{PollCode, VoteUpdate};
use tokio::sync::{broadcast, watch};

use crate::protocol::ChannelCommand;
use crate::transport::{Link, PushTransport};

#[derive(Debug, Default)]
struct Membership {
    /// Code the session wants to be joined to.
    desired: Option<PollCode>,
    /// Connection generation on which `joinPoll` for `desired` was emitted.
    sent_on: Option<u64>,
}

#[derive(Debug)]
pub struct SessionChannel<T: PushTransport> {
    transport: T,
    membership: Mutex<Membership>,
}

impl<T: PushTransport> SessionChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            membership: Mutex::new(Membership::default()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn joined_code(&self) -> Option<PollCode> {
        self.lock().desired.clone()
    }

    /// Whether `joinPoll` for the current code reached the live connection.
    pub fn is_live(&self) -> bool {
        let m = self.lock();
        let link = self.transport.link();
        link.connected && m.desired.is_some() && m.sent_on == Some(link.generation)
    }

    pub fn join(&self, code: &PollCode) {
        let mut m = self.lock();
        let link = self.transport.link();

        if m.desired.as_ref() == Some(code) && m.sent_on == Some(link.generation) {
            tracing::debug!(code = %code, "already joined");
            return;
        }

        if let Some(previous) = m.desired.take().filter(|p| p != code) {
            self.emit_leave(&mut m, previous);
        }

        m.desired = Some(code.clone());
        self.emit_join(&mut m, link);
    }

    pub fn leave(&self, code: &PollCode) {
        let mut m = self.lock();
        if m.desired.as_ref() != Some(code) {
            return;
        }
        m.desired = None;
        self.emit_leave(&mut m, code.clone());
    }

    /// Re-issue the desired join on a new connection generation.
    pub fn rejoin(&self) {
        let mut m = self.lock();
        let link = self.transport.link();
        if m.desired.is_none() || m.sent_on == Some(link.generation) {
            return;
        }
        self.emit_join(&mut m, link);
    }

    /// Whether `update` belongs to the code this channel is joined to.
    pub fn accepts(&self, update: &VoteUpdate) -> bool {
        self.lock()
            .desired
            .as_ref()
            .is_some_and(|code| update.targets(code))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoteUpdate> {
        self.transport.subscribe()
    }

    pub fn on_reconnect(&self) -> watch::Receiver<Link> {
        self.transport.on_reconnect()
    }

    fn emit_join(&self, m: &mut Membership, link: Link) {
        let Some(code) = m.desired.clone() else {
            return;
        };
        if link.connected && self.transport.send(ChannelCommand::Join(code.clone())) {
            tracing::debug!(code = %code, generation = link.generation, "joinPoll sent");
            m.sent_on = Some(link.generation);
        } else {
            tracing::debug!(code = %code, "channel offline, join deferred until reconnect");
            m.sent_on = None;
        }
    }

    fn emit_leave(&self, m: &mut Membership, code: PollCode) {
        // Only a join that reached the current connection needs undoing; a
        // dropped connection already forgot it server-side.
        let live = m.sent_on.take() == Some(self.transport.generation());
        if live && self.transport.send(ChannelCommand::Leave(code.clone())) {
            tracing::debug!(code = %code, "leavePoll sent");
        } else {
            tracing::debug!(code = %code, "leave without live join, nothing sent");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Membership> {
        self.membership.lock().unwrap_or_else(|e| e.into_inner())
    }
}
