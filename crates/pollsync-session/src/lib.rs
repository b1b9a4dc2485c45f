//! pollsync-session: the poll synchronizer.
//!
//! Reconciles a snapshot fetch, live push deltas and the participant's own
//! vote into one consistent view of a poll.

pub mod api;
pub mod synchronizer;

pub use api::PollApi;
pub use synchronizer::{PollSession, SessionPhase};
