//! REST collaborator consumed by the synchronizer.

use std::future::Future;
use std::sync::Arc;

use pollsync_core::PollError;
use pollsync_core::types::{Poll, PollCode, VoteTally};

/// `GET /polls/{code}` and `POST /polls/{code}/vote`.
///
/// Implementations map transport failures to `PollError::Network`, an
/// unresolvable code to `PollError::NotFound`, and `success: false` to
/// `PollError::ServerRejected`.
pub trait PollApi: Send + Sync + 'static {
    fn fetch_poll(&self, code: &PollCode) -> impl Future<Output = Result<Poll, PollError>> + Send;

    fn submit_vote(
        &self,
        code: &PollCode,
        selected: &[usize],
    ) -> impl Future<Output = Result<VoteTally, PollError>> + Send;
}

impl<A: PollApi> PollApi for Arc<A> {
    fn fetch_poll(&self, code: &PollCode) -> impl Future<Output = Result<Poll, PollError>> + Send {
        (**self).fetch_poll(code)
    }

    fn submit_vote(
        &self,
        code: &PollCode,
        selected: &[usize],
    ) -> impl Future<Output = Result<VoteTally, PollError>> + Send {
        (**self).submit_vote(code, selected)
    }
}
