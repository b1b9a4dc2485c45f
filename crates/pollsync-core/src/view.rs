//! Render-ready projection of a poll. Computed on demand, never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::{self, TimeRemaining};
use crate::tally::{self, Outcome};
use crate::types::{Poll, PollCode, Selection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub index: usize,
    pub label: String,
    pub votes: u64,
    pub percentage: u8,
    /// In the participant's pending selection.
    pub selected: bool,
    /// Part of the participant's confirmed vote.
    pub user_vote: bool,
    pub winning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollView {
    pub code: PollCode,
    pub name: String,
    pub question: String,
    pub allows_multiple: bool,
    pub time_remaining: TimeRemaining,
    /// Accepting selections and votes right now.
    pub open: bool,
    pub has_voted: bool,
    pub show_results: bool,
    pub total_votes: u64,
    /// `None` while results are hidden.
    pub outcome: Option<Outcome>,
    pub options: Vec<OptionView>,
}

impl PollView {
    pub fn winning_index(&self) -> Option<usize> {
        self.outcome.and_then(Outcome::winner)
    }

    pub fn selected_count(&self) -> usize {
        self.options.iter().filter(|o| o.selected).count()
    }
}

/// Derive the view of `poll` for the participant holding `selection`.
///
/// `show_results = voted || !open`; the winner is only evaluated when
/// results are shown.
pub fn project(poll: &Poll, selection: &Selection, now: DateTime<Utc>) -> PollView {
    let time_remaining = clock::time_remaining(poll.expires_at, now);
    let open = poll.is_active && time_remaining.active;
    let has_voted = poll.has_voted();
    let show_results = has_voted || !open;
    let outcome = show_results.then(|| tally::winner(&poll.vote_counts));
    let winning = outcome.and_then(Outcome::winner);
    let user_vote = poll.user_vote.as_deref().unwrap_or(&[]);

    let options = poll
        .options
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let votes = poll.vote_counts.get(index).copied().unwrap_or(0);
            OptionView {
                index,
                label: label.clone(),
                votes,
                percentage: tally::percentage(votes, poll.total_votes),
                selected: selection.contains(index),
                user_vote: user_vote.contains(&index),
                winning: winning == Some(index),
            }
        })
        .collect();

    PollView {
        code: poll.code.clone(),
        name: poll.name.clone(),
        question: poll.question.clone(),
        allows_multiple: poll.allows_multiple,
        time_remaining,
        open,
        has_voted,
        show_results,
        total_votes: poll.total_votes,
        outcome,
        options,
    }
}
