//! Wire frames: JSON text messages `{"event": <name>, "data": <payload>}`.
//!
//! Outbound: `joinPoll` / `leavePoll` carrying the poll code.
//! Inbound: `voteUpdate` carrying `{ voteCounts, totalVotes, code? }`.

use pollsync_core::types::{PollCode, VoteUpdate};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

pub const EVENT_JOIN: &str = "joinPoll";
pub const EVENT_LEAVE: &str = "leavePoll";
pub const EVENT_VOTE_UPDATE: &str = "voteUpdate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ChannelCommand {
    #[serde(rename = "joinPoll")]
    Join(PollCode),
    #[serde(rename = "leavePoll")]
    Leave(PollCode),
}

impl ChannelCommand {
    pub fn code(&self) -> &PollCode {
        match self {
            Self::Join(code) | Self::Leave(code) => code,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Join(_) => EVENT_JOIN,
            Self::Leave(_) => EVENT_LEAVE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub fn encode_command(command: &ChannelCommand) -> Result<String, ChannelError> {
    Ok(serde_json::to_string(command)?)
}

/// Decode one inbound text frame. Events other than `voteUpdate` decode to
/// `Ok(None)` so newer servers can add events without breaking clients.
pub fn decode_event(text: &str) -> Result<Option<VoteUpdate>, ChannelError> {
    let frame: RawFrame = serde_json::from_str(text)?;
    if frame.event != EVENT_VOTE_UPDATE {
        tracing::debug!(event = %frame.event, "ignoring unknown channel event");
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(frame.data)?))
}
