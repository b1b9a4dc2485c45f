//! HTTP client for the poll REST API.
//!
//! Every endpoint answers `{ success, data?, message? }`. Requests carry the
//! session cookie the backend hands out, so a participant's vote is recognised
//! on the next fetch.

use std::time::Duration;

use pollsync_channel::PushTransport;
use pollsync_core::PollError;
use pollsync_core::types::{
    ApiResponse, CreatePollRequest, CreatedPoll, Poll, PollCode, SubmitVoteRequest, VoteTally,
};
use pollsync_session::{PollApi, PollSession};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const FETCH_FAILED: &str = "Failed to fetch poll";
pub const SUBMIT_FAILED: &str = "Failed to submit vote";
pub const CREATE_FAILED: &str = "Failed to create poll";

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base: String,
}

impl HttpApi {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("pollsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn create_poll(&self, request: &CreatePollRequest) -> Result<PollCode, PollError> {
        let url = self.url("/polls");
        tracing::debug!(%url, answers = request.answers().len(), "creating poll");
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        let created: CreatedPoll = read_envelope(resp, None, CREATE_FAILED).await?;
        Ok(created.code)
    }
}

impl PollApi for HttpApi {
    async fn fetch_poll(&self, code: &PollCode) -> Result<Poll, PollError> {
        let url = self.url(&format!("/polls/{code}"));
        tracing::debug!(%url, "fetching poll");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;
        read_envelope(resp, Some(code), FETCH_FAILED).await
    }

    async fn submit_vote(&self, code: &PollCode, selected: &[usize]) -> Result<VoteTally, PollError> {
        let url = self.url(&format!("/polls/{code}/vote"));
        tracing::debug!(%url, ?selected, "posting vote");
        let body = SubmitVoteRequest {
            selected: selected.to_vec(),
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        read_envelope(resp, Some(code), SUBMIT_FAILED).await
    }
}

fn transport_error(e: reqwest::Error) -> PollError {
    PollError::Network(e.to_string())
}

async fn read_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
    code: Option<&PollCode>,
    fallback: &str,
) -> Result<T, PollError> {
    let status = resp.status();
    let body = resp.text().await.map_err(transport_error)?;
    parse_envelope(status, &body, code, fallback)
}

/// Map an HTTP status and body to the envelope's payload.
///
/// 404 on a poll endpoint is `NotFound` whatever the body says. A body that
/// is not an envelope is `Malformed` on 2xx and a rejection otherwise.
pub(crate) fn parse_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    code: Option<&PollCode>,
    fallback: &str,
) -> Result<T, PollError> {
    if let Some(code) = code.filter(|_| status == StatusCode::NOT_FOUND) {
        return Err(PollError::NotFound {
            code: code.to_string(),
        });
    }

    match serde_json::from_str::<ApiResponse<T>>(body) {
        Ok(envelope) => envelope.into_result(fallback),
        Err(e) if status.is_success() => Err(PollError::Malformed(e.to_string())),
        Err(e) => {
            tracing::debug!(%status, error = %e, "non-envelope error body");
            Err(PollError::ServerRejected(fallback.to_string()))
        }
    }
}

/// Load `session`, turning a failure into the participant-facing message.
pub(crate) async fn load_session<A: PollApi, T: PushTransport>(
    session: &PollSession<A, T>,
) -> anyhow::Result<()> {
    if let Err(e) = session.load().await {
        let message = session
            .last_error()
            .unwrap_or_else(|| e.user_message(FETCH_FAILED));
        anyhow::bail!("{}: {message}", session.code());
    }
    Ok(())
}
