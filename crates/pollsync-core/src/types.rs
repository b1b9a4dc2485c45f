use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock;
use crate::error::PollError;

// ─── Limits ───────────────────────────────────────────────────────

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;
pub const MAX_CODE_LEN: usize = 8;
pub const MIN_DURATION_HOURS: u32 = 1;
pub const MAX_DURATION_HOURS: u32 = 24;
pub const DEFAULT_DURATION_HOURS: u32 = 24;

// ─── Poll Code ────────────────────────────────────────────────────

/// Short human-shareable poll identifier, stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PollCode(String);

impl PollCode {
    pub fn parse(raw: &str) -> Result<Self, PollError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PollError::Validation("poll code is empty".to_string()));
        }
        if trimmed.len() > MAX_CODE_LEN {
            return Err(PollError::Validation(format!(
                "poll code is longer than {MAX_CODE_LEN} characters"
            )));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PollError::Validation(format!(
                "poll code must be alphanumeric: {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PollCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PollCode {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PollCode {
    type Error = PollError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PollCode> for String {
    fn from(code: PollCode) -> Self {
        code.0
    }
}

// ─── Authoritative counts ─────────────────────────────────────────

/// The two count fields the server owns. Both snapshot deltas and submit
/// acknowledgements carry exactly this pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    pub vote_counts: Vec<u64>,
    pub total_votes: u64,
}

impl VoteTally {
    pub fn new(vote_counts: Vec<u64>, total_votes: u64) -> Self {
        Self {
            vote_counts,
            total_votes,
        }
    }

    pub fn sum(&self) -> u64 {
        self.vote_counts.iter().sum()
    }

    /// `totalVotes == sum(voteCounts)`.
    pub fn is_consistent(&self) -> bool {
        self.sum() == self.total_votes
    }
}

/// Push-delivered delta. `code` is optional on the wire; when present it
/// scopes the update to one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<PollCode>,
    #[serde(flatten)]
    pub tally: VoteTally,
}

impl VoteUpdate {
    /// Whether this update may apply to the poll identified by `code`.
    pub fn targets(&self, code: &PollCode) -> bool {
        self.code.as_ref().is_none_or(|c| c == code)
    }
}

// ─── Poll ─────────────────────────────────────────────────────────

/// Poll snapshot as served by `GET /polls/{code}`.
///
/// Identity and configuration fields are immutable once fetched; only
/// `vote_counts`/`total_votes` change, and only via [`Poll::apply_tally`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub code: PollCode,
    pub name: String,
    pub question: String,
    #[serde(rename = "answers")]
    pub options: Vec<String>,
    #[serde(rename = "multipleChoices")]
    pub allows_multiple: bool,
    #[serde(rename = "validTill")]
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub vote_counts: Vec<u64>,
    pub total_votes: u64,
    #[serde(default)]
    pub user_vote: Option<Vec<usize>>,
}

impl Poll {
    /// Reject snapshots the rest of the pipeline cannot index safely.
    pub fn validate(&self) -> Result<(), PollError> {
        let n = self.options.len();
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&n) {
            return Err(PollError::Malformed(format!(
                "poll {} has {n} options, expected {MIN_OPTIONS}..={MAX_OPTIONS}",
                self.code
            )));
        }
        if self.vote_counts.len() != n {
            return Err(PollError::Malformed(format!(
                "poll {} has {} vote counts for {n} options",
                self.code,
                self.vote_counts.len()
            )));
        }
        if let Some(vote) = &self.user_vote {
            if let Some(bad) = vote.iter().find(|&&i| i >= n) {
                return Err(PollError::Malformed(format!(
                    "poll {} user vote references option {bad}",
                    self.code
                )));
            }
        }
        Ok(())
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn has_voted(&self) -> bool {
        self.user_vote.is_some()
    }

    /// Server flag AND local clock. The server can close a poll early; the
    /// clock closes it at `expires_at` without a round trip.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active && clock::is_active(self.expires_at, now)
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally::new(self.vote_counts.clone(), self.total_votes)
    }

    /// Overwrite both count fields. All-or-nothing: a tally whose length does
    /// not match the option list leaves the poll untouched.
    pub fn apply_tally(&mut self, tally: &VoteTally) -> Result<(), PollError> {
        if tally.vote_counts.len() != self.options.len() {
            return Err(PollError::Malformed(format!(
                "tally for poll {} has {} counts, expected {}",
                self.code,
                tally.vote_counts.len(),
                self.options.len()
            )));
        }
        self.vote_counts.clone_from(&tally.vote_counts);
        self.total_votes = tally.total_votes;
        Ok(())
    }
}

// ─── Local selection ──────────────────────────────────────────────

/// Ordered set of option indices, in the order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(Vec<usize>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from indices, dropping duplicates but keeping first-seen order.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut selection = Self::new();
        for i in indices {
            if !selection.contains(i) {
                selection.0.push(i);
            }
        }
        selection
    }

    /// Multiple-choice: flip membership of `index`.
    pub fn toggle(&mut self, index: usize) {
        if let Some(pos) = self.0.iter().position(|&i| i == index) {
            self.0.remove(pos);
        } else {
            self.0.push(index);
        }
    }

    /// Single-choice: selection becomes exactly `{index}`.
    pub fn choose_only(&mut self, index: usize) {
        self.0.clear();
        self.0.push(index);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.clone()
    }
}

// ─── Request bodies ───────────────────────────────────────────────

/// Body of `POST /polls/{code}/vote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitVoteRequest {
    pub selected: Vec<usize>,
}

/// Body of `POST /polls`. Only constructible through [`CreatePollRequest::new`],
/// which applies the same checks the server would.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    name: String,
    question: String,
    answers: Vec<String>,
    multiple_choices: bool,
    duration: u32,
}

impl CreatePollRequest {
    pub fn new(
        name: &str,
        question: &str,
        answers: &[String],
        multiple_choices: bool,
        duration_hours: u32,
    ) -> Result<Self, PollError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PollError::Validation("Poll name is required".to_string()));
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(PollError::Validation("Poll question is required".to_string()));
        }

        let answers: Vec<String> = answers
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        if answers.len() < MIN_OPTIONS {
            return Err(PollError::Validation(
                "Please provide at least 2 answers".to_string(),
            ));
        }
        if answers.len() > MAX_OPTIONS {
            return Err(PollError::Validation(format!(
                "At most {MAX_OPTIONS} answers are allowed"
            )));
        }
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&duration_hours) {
            return Err(PollError::Validation(format!(
                "Duration must be between {MIN_DURATION_HOURS} and {MAX_DURATION_HOURS} hours"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            question: question.to_string(),
            answers,
            multiple_choices,
            duration: duration_hours,
        })
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }
}

/// `data` of a successful `POST /polls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPoll {
    pub code: PollCode,
}

// ─── Response envelope ────────────────────────────────────────────

/// `{ success, data?, message? }` wrapper used by every REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// `success: false` becomes `ServerRejected` carrying the server message
    /// (or `fallback` when it sent none).
    pub fn into_result(self, fallback: &str) -> Result<T, PollError> {
        if !self.success {
            let message = self
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string());
            return Err(PollError::ServerRejected(message));
        }
        self.data
            .ok_or_else(|| PollError::Malformed("success response without data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_poll() -> Poll {
        serde_json::from_value(serde_json::json!({
            "id": "6650f0c2",
            "code": "abc123",
            "name": "Lunch",
            "question": "Where should we eat?",
            "answers": ["Tacos", "Ramen", "Salad"],
            "multipleChoices": false,
            "validTill": "2026-10-19T12:00:00Z",
            "isActive": true,
            "voteCounts": [1, 2, 0],
            "totalVotes": 3,
            "userVote": null
        }))
        .unwrap()
    }

    #[test]
    fn code_is_trimmed_and_upper_cased() {
        let code = PollCode::parse("  ab12cd ").unwrap();
        assert_eq!(code.as_str(), "AB12CD");
        assert_eq!(code, "AB12CD".parse().unwrap());
    }

    #[test]
    fn code_rejects_blank_long_and_symbols() {
        assert!(matches!(PollCode::parse("   "), Err(PollError::Validation(_))));
        assert!(PollCode::parse("ABCDEFGHI").is_err());
        assert!(PollCode::parse("AB-12").is_err());
    }

    #[test]
    fn snapshot_deserializes_wire_names() {
        let poll = sample_poll();
        assert_eq!(poll.code.as_str(), "ABC123");
        assert_eq!(poll.options, vec!["Tacos", "Ramen", "Salad"]);
        assert!(!poll.allows_multiple);
        assert!(poll.user_vote.is_none());
        assert!(poll.validate().is_ok());
    }

    #[test]
    fn snapshot_with_count_mismatch_is_malformed() {
        let mut poll = sample_poll();
        poll.vote_counts = vec![1, 2];
        assert!(matches!(poll.validate(), Err(PollError::Malformed(_))));
    }

    #[test]
    fn snapshot_with_single_option_is_malformed() {
        let mut poll = sample_poll();
        poll.options.truncate(1);
        poll.vote_counts.truncate(1);
        assert!(poll.validate().is_err());
    }

    #[test]
    fn user_vote_out_of_range_is_malformed() {
        let mut poll = sample_poll();
        poll.user_vote = Some(vec![3]);
        assert!(poll.validate().is_err());
    }

    #[test]
    fn apply_tally_overwrites_counts_only() {
        let mut poll = sample_poll();
        let before = poll.clone();
        poll.apply_tally(&VoteTally::new(vec![5, 0, 1], 6)).unwrap();
        assert_eq!(poll.vote_counts, vec![5, 0, 1]);
        assert_eq!(poll.total_votes, 6);
        assert_eq!(poll.name, before.name);
        assert_eq!(poll.user_vote, before.user_vote);
    }

    #[test]
    fn apply_tally_wrong_length_leaves_poll_untouched() {
        let mut poll = sample_poll();
        let before = poll.clone();
        let err = poll.apply_tally(&VoteTally::new(vec![9, 9], 18)).unwrap_err();
        assert!(matches!(err, PollError::Malformed(_)));
        assert_eq!(poll, before);
    }

    #[test]
    fn inconsistent_tally_detected() {
        assert!(VoteTally::new(vec![1, 2], 3).is_consistent());
        assert!(!VoteTally::new(vec![1, 2], 4).is_consistent());
    }

    #[test]
    fn vote_update_scoping() {
        let code = PollCode::parse("ABC").unwrap();
        let other = PollCode::parse("XYZ").unwrap();
        let unscoped: VoteUpdate =
            serde_json::from_str(r#"{"voteCounts":[1,1],"totalVotes":2}"#).unwrap();
        assert!(unscoped.targets(&code));
        let scoped: VoteUpdate =
            serde_json::from_str(r#"{"code":"xyz","voteCounts":[1,1],"totalVotes":2}"#).unwrap();
        assert!(scoped.targets(&other));
        assert!(!scoped.targets(&code));
    }

    #[test]
    fn single_choice_replaces() {
        let mut sel = Selection::new();
        sel.choose_only(0);
        sel.choose_only(1);
        assert_eq!(sel.as_slice(), &[1]);
    }

    #[test]
    fn multiple_choice_toggles() {
        let mut sel = Selection::new();
        sel.toggle(0);
        sel.toggle(1);
        sel.toggle(0);
        assert_eq!(sel.as_slice(), &[1]);
    }

    #[test]
    fn from_indices_dedups_in_order() {
        let sel = Selection::from_indices([2, 0, 2, 1]);
        assert_eq!(sel.as_slice(), &[2, 0, 1]);
    }

    #[test]
    fn create_request_drops_blank_answers() {
        let answers = vec!["Yes".to_string(), "  ".to_string(), " No ".to_string()];
        let req = CreatePollRequest::new("Team", "Ship it?", &answers, false, 24).unwrap();
        assert_eq!(req.answers(), &["Yes".to_string(), "No".to_string()]);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["multipleChoices"], false);
        assert_eq!(body["duration"], 24);
    }

    #[test]
    fn create_request_needs_two_answers() {
        let answers = vec!["Yes".to_string(), "".to_string()];
        let err = CreatePollRequest::new("Team", "Ship it?", &answers, false, 24).unwrap_err();
        assert_eq!(
            err,
            PollError::Validation("Please provide at least 2 answers".to_string())
        );
    }

    #[test]
    fn create_request_bounds() {
        let eleven: Vec<String> = (0..11).map(|i| format!("opt {i}")).collect();
        assert!(CreatePollRequest::new("n", "q", &eleven, true, 24).is_err());
        let two = vec!["a".to_string(), "b".to_string()];
        assert!(CreatePollRequest::new("n", "q", &two, true, 0).is_err());
        assert!(CreatePollRequest::new("n", "q", &two, true, 25).is_err());
        assert!(CreatePollRequest::new(" ", "q", &two, true, 1).is_err());
        assert!(CreatePollRequest::new("n", "", &two, true, 1).is_err());
    }

    #[test]
    fn envelope_failure_carries_server_message() {
        let resp: ApiResponse<Poll> =
            serde_json::from_str(r#"{"success":false,"message":"Poll not found"}"#).unwrap();
        assert_eq!(
            resp.into_result("Failed to fetch poll").unwrap_err(),
            PollError::ServerRejected("Poll not found".to_string())
        );
    }

    #[test]
    fn envelope_failure_without_message_uses_fallback() {
        let resp: ApiResponse<VoteTally> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(
            resp.into_result("Failed to submit vote").unwrap_err(),
            PollError::ServerRejected("Failed to submit vote".to_string())
        );
    }

    #[test]
    fn envelope_success_without_data_is_malformed() {
        let resp: ApiResponse<VoteTally> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(
            resp.into_result("x"),
            Err(PollError::Malformed(_))
        ));
    }
}
