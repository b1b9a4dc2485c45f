//! Poll synchronizer: per-code state machine over snapshot, deltas and vote.
//!
//! ```text
//! LOADING ──ok──▶ READY_UNVOTED ──submit ok──▶ READY_VOTED
//!    │                  (select / submit)         (deltas only)
//!    ├──not found──▶ NOT_FOUND
//!    └──failure────▶ ERROR  (caller may load again)
//! ```
//!
//! All mutations go through one mutex and are all-or-nothing. Deltas
//! overwrite the count fields in any ready state and never touch the
//! selection or the confirmed vote. Load and submit results are tagged with
//! the epoch they started in; a result whose epoch is no longer current, or
//! that arrives after the session closed, is discarded. A reload cannot
//! start while a vote is outstanding, so a vote result is only ever
//! discarded once the session closed.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use pollsync_channel::{PushTransport, SessionChannel};
use pollsync_core::PollError;
use pollsync_core::types::{Poll, PollCode, Selection, VoteTally};
use pollsync_core::view::{self, PollView};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::api::PollApi;

const LOAD_FAILED: &str = "Failed to fetch poll";
const SUBMIT_FAILED: &str = "Failed to submit vote";

/// Source of "now" for expiry checks.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Loading,
    ReadyUnvoted,
    ReadyVoted,
    NotFound,
    Error,
}

impl SessionPhase {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::ReadyUnvoted | Self::ReadyVoted)
    }
}

#[derive(Debug)]
enum LoadState {
    Loading,
    Loaded(Poll),
    NotFound,
    Failed,
}

#[derive(Debug)]
struct SessionState {
    load: LoadState,
    selection: Selection,
    submitting: bool,
    epoch: u64,
    closed: bool,
    /// Last user-facing error from load or submit.
    last_error: Option<String>,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match &self.load {
            LoadState::Loading => SessionPhase::Loading,
            LoadState::Loaded(poll) if poll.has_voted() => SessionPhase::ReadyVoted,
            LoadState::Loaded(_) => SessionPhase::ReadyUnvoted,
            LoadState::NotFound => SessionPhase::NotFound,
            LoadState::Failed => SessionPhase::Error,
        }
    }

    fn poll(&self) -> Option<&Poll> {
        match &self.load {
            LoadState::Loaded(poll) => Some(poll),
            _ => None,
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        !self.closed && self.epoch == epoch
    }
}

struct Shared<A> {
    code: PollCode,
    api: A,
    state: Mutex<SessionState>,
    version: watch::Sender<u64>,
}

impl<A> Shared<A> {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    fn apply_delta(&self, tally: &VoteTally) -> bool {
        let mut st = self.lock();
        if st.closed {
            return false;
        }
        let LoadState::Loaded(poll) = &mut st.load else {
            tracing::debug!(code = %self.code, "delta before snapshot, ignored");
            return false;
        };
        if let Err(e) = poll.apply_tally(tally) {
            tracing::warn!(code = %self.code, error = %e, "discarding delta");
            return false;
        }
        if !tally.is_consistent() {
            tracing::warn!(
                code = %self.code,
                total_votes = tally.total_votes,
                sum = tally.sum(),
                "delta totalVotes does not match voteCounts"
            );
        }
        tracing::debug!(code = %self.code, total_votes = tally.total_votes, "delta applied");
        drop(st);
        self.bump();
        true
    }
}

/// One participant's session on one poll.
///
/// Dropping the session releases the channel subscription (if any), stops
/// the delta pump and discards any result still in flight.
pub struct PollSession<A: PollApi, T: PushTransport> {
    shared: Arc<Shared<A>>,
    channel: Arc<SessionChannel<T>>,
    pump: Mutex<Option<DropGuard>>,
    clock: Clock,
}

impl<A: PollApi, T: PushTransport> PollSession<A, T> {
    /// Enter a session for `code`. Nothing is fetched until [`load`](Self::load).
    pub fn open(code: PollCode, api: A, channel: SessionChannel<T>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                code,
                api,
                state: Mutex::new(SessionState {
                    load: LoadState::Loading,
                    selection: Selection::new(),
                    submitting: false,
                    epoch: 0,
                    closed: false,
                    last_error: None,
                }),
                version,
            }),
            channel: Arc::new(channel),
            pump: Mutex::new(None),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn code(&self) -> &PollCode {
        &self.shared.code
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.lock().phase()
    }

    pub fn poll(&self) -> Option<Poll> {
        self.shared.lock().poll().cloned()
    }

    pub fn selection(&self) -> Selection {
        self.shared.lock().selection.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.shared.lock().submitting
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    /// Live updates are flowing: joined on an established connection.
    pub fn is_live(&self) -> bool {
        self.channel.is_live()
    }

    /// Yields a new version after every accepted mutation.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.version.subscribe()
    }

    /// Derived view at the current instant; `None` until a snapshot loaded.
    pub fn view(&self) -> Option<PollView> {
        let now = (self.clock)();
        let st = self.shared.lock();
        st.poll().map(|poll| view::project(poll, &st.selection, now))
    }

    /// Fetch the snapshot and, on success, subscribe to live deltas.
    ///
    /// Fails with `SubmitInFlight` while a vote is outstanding: the vote's
    /// confirmation must land on the poll it was cast against.
    pub async fn load(&self) -> Result<SessionPhase, PollError> {
        let code = self.shared.code.clone();
        let epoch = {
            let mut st = self.shared.lock();
            if st.closed {
                return Err(PollError::SessionClosed);
            }
            if st.submitting {
                tracing::debug!(code = %code, "reload rejected: submit in flight");
                return Err(PollError::SubmitInFlight);
            }
            st.epoch += 1;
            st.load = LoadState::Loading;
            st.selection = Selection::new();
            st.last_error = None;
            st.epoch
        };
        self.shared.bump();
        tracing::debug!(code = %code, epoch, "loading poll");

        let result = self
            .shared
            .api
            .fetch_poll(&code)
            .await
            .and_then(|poll| poll.validate().map(|()| poll));

        let mut st = self.shared.lock();
        if !st.is_current(epoch) {
            tracing::debug!(code = %code, epoch, "stale load result discarded");
            return Err(PollError::SessionClosed);
        }

        match result {
            Ok(poll) => {
                if !poll.vote_counts.is_empty() && !poll.tally().is_consistent() {
                    tracing::warn!(
                        code = %code,
                        total_votes = poll.total_votes,
                        "snapshot totalVotes does not match voteCounts"
                    );
                }
                st.selection = poll
                    .user_vote
                    .as_ref()
                    .map(|v| Selection::from_indices(v.iter().copied()))
                    .unwrap_or_default();
                st.load = LoadState::Loaded(poll);
                let phase = st.phase();
                drop(st);

                tracing::info!(code = %code, ?phase, "poll loaded");
                self.subscribe();
                self.shared.bump();
                Ok(phase)
            }
            Err(e) => {
                st.load = match e {
                    PollError::NotFound { .. } => LoadState::NotFound,
                    _ => LoadState::Failed,
                };
                st.last_error = Some(e.user_message(LOAD_FAILED));
                drop(st);

                tracing::warn!(code = %code, error = %e, "poll load failed");
                self.shared.bump();
                Err(e)
            }
        }
    }

    /// Toggle option `index` into the pending selection.
    ///
    /// Returns whether the selection changed. A no-op unless the poll is
    /// loaded, unvoted, open and not mid-submit.
    pub fn select(&self, index: usize) -> bool {
        let now = (self.clock)();
        let mut st = self.shared.lock();
        if st.submitting {
            tracing::debug!(code = %self.shared.code, index, "select ignored: submit in flight");
            return false;
        }
        let Some(poll) = st.poll() else {
            return false;
        };
        if poll.has_voted() || !poll.is_open(now) || index >= poll.option_count() {
            return false;
        }
        let allows_multiple = poll.allows_multiple;

        let before = st.selection.clone();
        if allows_multiple {
            st.selection.toggle(index);
        } else {
            st.selection.choose_only(index);
        }
        let changed = st.selection != before;
        drop(st);

        if changed {
            self.shared.bump();
        }
        changed
    }

    /// Send the pending selection as this participant's vote.
    ///
    /// Single-flight: a second call while one is outstanding fails with
    /// `SubmitInFlight` without touching the network. Once the vote is
    /// confirmed every later call fails with `AlreadyVoted`.
    pub async fn submit(&self) -> Result<VoteTally, PollError> {
        let code = self.shared.code.clone();
        let now = (self.clock)();
        let (epoch, selected) = {
            let mut st = self.shared.lock();
            if st.closed {
                return Err(PollError::SessionClosed);
            }
            let Some(poll) = st.poll() else {
                return Err(PollError::NotReady);
            };
            if poll.has_voted() {
                return Err(PollError::AlreadyVoted);
            }
            let open = poll.is_open(now);
            if st.submitting {
                tracing::debug!(code = %code, "submit rejected: already in flight");
                return Err(PollError::SubmitInFlight);
            }
            if !open {
                return Err(PollError::Expired);
            }
            if st.selection.is_empty() {
                return Err(PollError::Validation(
                    "Select at least one option".to_string(),
                ));
            }
            st.submitting = true;
            st.last_error = None;
            (st.epoch, st.selection.to_vec())
        };
        self.shared.bump();
        tracing::debug!(code = %code, ?selected, "submitting vote");

        let result = self.shared.api.submit_vote(&code, &selected).await;

        let mut st = self.shared.lock();
        if !st.is_current(epoch) {
            tracing::debug!(code = %code, epoch, "stale submit result discarded");
            return Err(PollError::SessionClosed);
        }
        st.submitting = false;

        let outcome = match result {
            Ok(tally) => match &mut st.load {
                LoadState::Loaded(poll) => match poll.apply_tally(&tally) {
                    Ok(()) => {
                        poll.user_vote = Some(selected);
                        if !tally.is_consistent() {
                            tracing::warn!(
                                code = %code,
                                total_votes = tally.total_votes,
                                sum = tally.sum(),
                                "vote response totalVotes does not match voteCounts"
                            );
                        }
                        tracing::info!(code = %code, total_votes = tally.total_votes, "vote confirmed");
                        Ok(tally)
                    }
                    Err(e) => Err(e),
                },
                _ => Err(PollError::NotReady),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            tracing::warn!(code = %code, error = %e, "vote submission failed");
            st.last_error = Some(e.user_message(SUBMIT_FAILED));
        }
        drop(st);
        self.shared.bump();
        outcome
    }

    /// Overwrite the count fields from an authoritative update. Returns
    /// whether it was applied.
    pub fn apply_delta(&self, tally: &VoteTally) -> bool {
        self.shared.apply_delta(tally)
    }

    /// Release the session explicitly. Equivalent to dropping it.
    pub fn close(self) {}

    /// Start the delta pump (once), then join the poll's channel.
    ///
    /// The receivers are taken before `join` so no update sent in reply to
    /// the join can be missed.
    fn subscribe(&self) {
        let mut slot = self.pump.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            let cancel = CancellationToken::new();
            let token = cancel.clone();
            let mut updates = self.channel.subscribe();
            let mut reconnects = self.channel.on_reconnect();
            let shared = Arc::clone(&self.shared);
            let channel = Arc::clone(&self.channel);

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        changed = reconnects.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let link = *reconnects.borrow_and_update();
                            if link.connected {
                                tracing::info!(
                                    code = %shared.code,
                                    generation = link.generation,
                                    "push channel reconnected, rejoining"
                                );
                                channel.rejoin();
                            }
                        }
                        recv = updates.recv() => match recv {
                            Ok(update) => {
                                if channel.accepts(&update) {
                                    shared.apply_delta(&update.tally);
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                // Next update overwrites the counts anyway.
                                tracing::debug!(code = %shared.code, skipped, "delta receiver lagged");
                            }
                            Err(RecvError::Closed) => break,
                        },
                    }
                }
                tracing::debug!(code = %shared.code, "delta pump stopped");
            });

            *slot = Some(cancel.drop_guard());
        }
        drop(slot);

        self.channel.join(&self.shared.code);
        if !self.channel.is_live() {
            tracing::debug!(
                code = %self.shared.code,
                error = %PollError::ChannelUnavailable,
                "showing snapshot until the push channel reconnects"
            );
        }
    }
}

impl<A: PollApi, T: PushTransport> Drop for PollSession<A, T> {
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.channel.leave(&self.shared.code);
        if let Some(guard) = self.pump.lock().unwrap_or_else(|e| e.into_inner()).take() {
            drop(guard);
        }
        tracing::debug!(code = %self.shared.code, "poll session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pollsync_channel::memory::MemoryTransport;
    use pollsync_channel::protocol::ChannelCommand;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-19T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn fixed_clock() -> Clock {
        Arc::new(now)
    }

    fn code() -> PollCode {
        PollCode::parse("UNIT1").unwrap()
    }

    fn snapshot(allows_multiple: bool) -> Poll {
        Poll {
            id: None,
            code: code(),
            name: "Retro".into(),
            question: "Which day?".into(),
            options: vec!["Mon".into(), "Tue".into(), "Wed".into()],
            allows_multiple,
            expires_at: now() + TimeDelta::hours(2),
            is_active: true,
            vote_counts: vec![1, 1, 0],
            total_votes: 2,
            user_vote: None,
        }
    }

    /// Answers immediately from fixed data and counts calls.
    struct StaticApi {
        poll: Result<Poll, PollError>,
        vote: Result<VoteTally, PollError>,
        votes_sent: AtomicUsize,
    }

    impl StaticApi {
        fn new(poll: Result<Poll, PollError>, vote: Result<VoteTally, PollError>) -> Self {
            Self {
                poll,
                vote,
                votes_sent: AtomicUsize::new(0),
            }
        }
    }

    impl PollApi for StaticApi {
        async fn fetch_poll(&self, _code: &PollCode) -> Result<Poll, PollError> {
            self.poll.clone()
        }

        async fn submit_vote(&self, _code: &PollCode, _selected: &[usize]) -> Result<VoteTally, PollError> {
            self.votes_sent.fetch_add(1, Ordering::SeqCst);
            self.vote.clone()
        }
    }

    fn session(
        api: StaticApi,
    ) -> (
        PollSession<Arc<StaticApi>, Arc<MemoryTransport>>,
        Arc<StaticApi>,
        Arc<MemoryTransport>,
    ) {
        let api = Arc::new(api);
        let transport = Arc::new(MemoryTransport::connected());
        let s = PollSession::open(
            code(),
            Arc::clone(&api),
            SessionChannel::new(Arc::clone(&transport)),
        )
        .with_clock(fixed_clock());
        (s, api, transport)
    }

    #[tokio::test]
    async fn load_unvoted() {
        let (s, _, t) = session(StaticApi::new(
            Ok(snapshot(false)),
            Ok(VoteTally::default()),
        ));
        assert_eq!(s.phase(), SessionPhase::Loading);
        assert_eq!(s.load().await.unwrap(), SessionPhase::ReadyUnvoted);
        assert!(s.selection().is_empty());
        assert_eq!(t.sent(), vec![ChannelCommand::Join(code())]);
    }

    #[tokio::test]
    async fn load_with_existing_vote_starts_voted() {
        let mut poll = snapshot(true);
        poll.user_vote = Some(vec![2, 0]);
        let (s, _, _) = session(StaticApi::new(Ok(poll), Ok(VoteTally::default())));
        assert_eq!(s.load().await.unwrap(), SessionPhase::ReadyVoted);
        assert_eq!(s.selection().as_slice(), &[2, 0]);
        assert!(s.view().unwrap().show_results);
    }

    #[tokio::test]
    async fn load_not_found_is_terminal_and_does_not_join() {
        let (s, _, t) = session(StaticApi::new(
            Err(PollError::NotFound { code: "UNIT1".into() }),
            Ok(VoteTally::default()),
        ));
        assert!(s.load().await.is_err());
        assert_eq!(s.phase(), SessionPhase::NotFound);
        assert_eq!(s.last_error().as_deref(), Some("Poll not found"));
        assert!(t.sent().is_empty());
        drop(s);
        assert!(t.sent().is_empty(), "no join, so no leave");
    }

    #[tokio::test]
    async fn load_network_failure_is_error_with_fallback_message() {
        let (s, _, _) = session(StaticApi::new(
            Err(PollError::Network("connection refused".into())),
            Ok(VoteTally::default()),
        ));
        assert!(matches!(s.load().await, Err(PollError::Network(_))));
        assert_eq!(s.phase(), SessionPhase::Error);
        assert_eq!(s.last_error().as_deref(), Some("Failed to fetch poll"));
        assert!(s.view().is_none());
    }

    #[tokio::test]
    async fn malformed_snapshot_is_error() {
        let mut poll = snapshot(false);
        poll.vote_counts.pop();
        let (s, _, _) = session(StaticApi::new(Ok(poll), Ok(VoteTally::default())));
        assert!(matches!(s.load().await, Err(PollError::Malformed(_))));
        assert_eq!(s.phase(), SessionPhase::Error);
    }

    #[tokio::test]
    async fn single_choice_is_exclusive() {
        let (s, _, _) = session(StaticApi::new(Ok(snapshot(false)), Ok(VoteTally::default())));
        s.load().await.unwrap();
        assert!(s.select(0));
        assert!(s.select(1));
        assert_eq!(s.selection().as_slice(), &[1]);
        assert!(!s.select(1), "re-selecting the same option changes nothing");
    }

    #[tokio::test]
    async fn multiple_choice_toggles() {
        let (s, _, _) = session(StaticApi::new(Ok(snapshot(true)), Ok(VoteTally::default())));
        s.load().await.unwrap();
        s.select(0);
        s.select(1);
        s.select(0);
        assert_eq!(s.selection().as_slice(), &[1]);
    }

    #[tokio::test]
    async fn select_out_of_range_is_noop() {
        let (s, _, _) = session(StaticApi::new(Ok(snapshot(true)), Ok(VoteTally::default())));
        s.load().await.unwrap();
        assert!(!s.select(3));
        assert!(s.selection().is_empty());
    }

    #[tokio::test]
    async fn select_before_load_is_noop() {
        let (s, _, _) = session(StaticApi::new(Ok(snapshot(true)), Ok(VoteTally::default())));
        assert!(!s.select(0));
    }

    #[tokio::test]
    async fn expired_poll_rejects_select_and_submit() {
        let mut poll = snapshot(false);
        poll.expires_at = now() - TimeDelta::minutes(1);
        let (s, api, _) = session(StaticApi::new(Ok(poll), Ok(VoteTally::default())));
        s.load().await.unwrap();
        assert!(!s.select(0));
        assert_eq!(s.submit().await.unwrap_err(), PollError::Expired);
        assert_eq!(api.votes_sent.load(Ordering::SeqCst), 0);
        assert!(s.view().unwrap().show_results);
    }

    #[tokio::test]
    async fn server_inactive_flag_rejects_select() {
        let mut poll = snapshot(false);
        poll.is_active = false;
        let (s, _, _) = session(StaticApi::new(Ok(poll), Ok(VoteTally::default())));
        s.load().await.unwrap();
        assert!(!s.select(0));
    }

    #[tokio::test]
    async fn empty_selection_is_rejected_before_network() {
        let (s, api, _) = session(StaticApi::new(Ok(snapshot(false)), Ok(VoteTally::default())));
        s.load().await.unwrap();
        assert!(matches!(s.submit().await, Err(PollError::Validation(_))));
        assert_eq!(api.votes_sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_success_promotes_selection() {
        let (s, _, _) = session(StaticApi::new(
            Ok(snapshot(false)),
            Ok(VoteTally::new(vec![2, 1, 0], 3)),
        ));
        s.load().await.unwrap();
        s.select(0);
        let tally = s.submit().await.unwrap();
        assert_eq!(tally.total_votes, 3);
        assert_eq!(s.phase(), SessionPhase::ReadyVoted);
        let poll = s.poll().unwrap();
        assert_eq!(poll.user_vote, Some(vec![0]));
        assert_eq!(poll.vote_counts, vec![2, 1, 0]);
        let view = s.view().unwrap();
        assert!(view.show_results);
        assert_eq!(view.winning_index(), Some(0));
    }

    #[tokio::test]
    async fn submit_failure_keeps_selection_for_retry() {
        let (s, api, _) = session(StaticApi::new(
            Ok(snapshot(true)),
            Err(PollError::ServerRejected("Poll is closed".into())),
        ));
        s.load().await.unwrap();
        s.select(0);
        s.select(2);
        let before = s.poll().unwrap();

        let err = s.submit().await.unwrap_err();
        assert_eq!(err, PollError::ServerRejected("Poll is closed".into()));
        assert_eq!(s.phase(), SessionPhase::ReadyUnvoted);
        assert_eq!(s.selection().as_slice(), &[0, 2]);
        assert_eq!(s.poll().unwrap(), before);
        assert_eq!(s.last_error().as_deref(), Some("Poll is closed"));
        assert!(!s.is_submitting());

        // Retry is allowed.
        assert!(s.submit().await.is_err());
        assert_eq!(api.votes_sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_vote_response_leaves_state_untouched() {
        let (s, _, _) = session(StaticApi::new(
            Ok(snapshot(false)),
            Ok(VoteTally::new(vec![1], 1)),
        ));
        s.load().await.unwrap();
        s.select(1);
        assert!(matches!(s.submit().await, Err(PollError::Malformed(_))));
        assert_eq!(s.phase(), SessionPhase::ReadyUnvoted);
        assert_eq!(s.poll().unwrap().vote_counts, vec![1, 1, 0]);
        assert_eq!(s.selection().as_slice(), &[1]);
    }

    #[tokio::test]
    async fn voted_session_is_frozen() {
        let (s, api, _) = session(StaticApi::new(
            Ok(snapshot(true)),
            Ok(VoteTally::new(vec![2, 1, 0], 3)),
        ));
        s.load().await.unwrap();
        s.select(0);
        s.submit().await.unwrap();

        assert!(!s.select(1));
        assert!(!s.select(0));
        assert_eq!(s.submit().await.unwrap_err(), PollError::AlreadyVoted);
        assert_eq!(s.selection().as_slice(), &[0]);
        assert_eq!(api.votes_sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delta_overwrites_counts_in_both_ready_states() {
        let (s, _, _) = session(StaticApi::new(
            Ok(snapshot(false)),
            Ok(VoteTally::new(vec![2, 1, 0], 3)),
        ));
        s.load().await.unwrap();
        s.select(2);
        assert!(s.apply_delta(&VoteTally::new(vec![4, 4, 4], 12)));
        assert_eq!(s.poll().unwrap().total_votes, 12);
        assert_eq!(s.selection().as_slice(), &[2], "selection untouched");

        s.submit().await.unwrap();
        assert!(s.apply_delta(&VoteTally::new(vec![5, 4, 4], 13)));
        let poll = s.poll().unwrap();
        assert_eq!(poll.vote_counts, vec![5, 4, 4]);
        assert_eq!(poll.user_vote, Some(vec![2]), "confirmed vote untouched");
    }

    #[tokio::test]
    async fn delta_before_load_is_ignored() {
        let (s, _, _) = session(StaticApi::new(Ok(snapshot(false)), Ok(VoteTally::default())));
        assert!(!s.apply_delta(&VoteTally::new(vec![1, 1, 1], 3)));
    }

    #[tokio::test]
    async fn inconsistent_delta_trusts_total() {
        let (s, _, _) = session(StaticApi::new(Ok(snapshot(false)), Ok(VoteTally::default())));
        s.load().await.unwrap();
        assert!(s.apply_delta(&VoteTally::new(vec![1, 1, 1], 10)));
        assert_eq!(s.view().unwrap().total_votes, 10);
    }

    #[tokio::test]
    async fn drop_leaves_joined_code() {
        let (s, _, t) = session(StaticApi::new(Ok(snapshot(false)), Ok(VoteTally::default())));
        s.load().await.unwrap();
        s.close();
        assert_eq!(
            t.sent(),
            vec![ChannelCommand::Join(code()), ChannelCommand::Leave(code())]
        );
    }

    #[tokio::test]
    async fn reload_resets_selection_and_does_not_rejoin() {
        let (s, _, t) = session(StaticApi::new(Ok(snapshot(true)), Ok(VoteTally::default())));
        s.load().await.unwrap();
        s.select(1);
        s.load().await.unwrap();
        assert!(s.selection().is_empty());
        assert_eq!(t.sent(), vec![ChannelCommand::Join(code())]);
    }

    #[tokio::test]
    async fn changes_version_advances() {
        let (s, _, _) = session(StaticApi::new(Ok(snapshot(true)), Ok(VoteTally::default())));
        let rx = s.changes();
        let v0 = *rx.borrow();
        s.load().await.unwrap();
        let v1 = *rx.borrow();
        assert!(v1 > v0);
        s.select(0);
        assert!(*rx.borrow() > v1);
    }

    proptest! {
        #[test]
        fn last_delta_wins(deltas in proptest::collection::vec(proptest::collection::vec(0u64..50, 3), 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let (s, _, _) = session(StaticApi::new(Ok(snapshot(false)), Ok(VoteTally::default())));
                s.load().await.unwrap();
                for counts in &deltas {
                    let total = counts.iter().sum();
                    s.apply_delta(&VoteTally::new(counts.clone(), total));
                    let poll = s.poll().unwrap();
                    assert_eq!(&poll.vote_counts, counts);
                    assert_eq!(poll.total_votes, total);
                }
            });
        }
    }
}
