//! Clock projector: expiry timestamp -> time-remaining label.
//!
//! Pure and side-effect free; callers invoke it per render or per tick.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const EXPIRED_LABEL: &str = "Expired";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRemaining {
    pub label: String,
    pub active: bool,
}

/// `now < expires_at`. The poll is inactive from the expiry instant on.
pub fn is_active(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now < expires_at
}

/// Project `expires_at` against `now`.
///
/// ```text
/// 90 min left  -> "1h 30m"
/// 45 s left    -> "0m"
/// past expiry  -> "Expired"
/// ```
pub fn time_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> TimeRemaining {
    if !is_active(expires_at, now) {
        return TimeRemaining {
            label: EXPIRED_LABEL.to_string(),
            active: false,
        };
    }

    let left = expires_at - now;
    let hours = left.num_hours();
    let minutes = left.num_minutes() % 60;

    let label = if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    };

    TimeRemaining {
        label,
        active: true,
    }
}
