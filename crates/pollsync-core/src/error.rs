//! Error taxonomy shared by every pollsync crate.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// The poll code does not resolve. Terminal for the session.
    #[error("poll {code} not found")]
    NotFound { code: String },

    /// Rejected client-side before any network call.
    #[error("{0}")]
    Validation(String),

    /// The request did not complete (connect, timeout, body decode).
    #[error("network failure: {0}")]
    Network(String),

    /// The server answered `success: false`; the message is shown verbatim.
    #[error("{0}")]
    ServerRejected(String),

    /// Push connection not established. Live updates pause until reconnect.
    #[error("push channel unavailable")]
    ChannelUnavailable,

    #[error("malformed poll data: {0}")]
    Malformed(String),

    #[error("a vote has already been cast for this poll")]
    AlreadyVoted,

    #[error("a vote submission is already in flight")]
    SubmitInFlight,

    #[error("poll has expired")]
    Expired,

    #[error("poll is not loaded")]
    NotReady,

    #[error("session closed")]
    SessionClosed,
}

impl PollError {
    /// Text to show the participant. `fallback` replaces transport detail
    /// that means nothing to a user (e.g. "Failed to submit vote").
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::NotFound { .. } => "Poll not found".to_string(),
            Self::Network(_) | Self::Malformed(_) => fallback.to_string(),
            Self::ServerRejected(msg) if msg.trim().is_empty() => fallback.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether re-invoking the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ServerRejected(_))
    }
}
