use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use shared::{
    domain::{AlumniId, ThreadId, Vote},
    error::{ApiError, ApiException},
    protocol::{SubmitVoteRequest, VoteTally},
};
use url::Url;

use crate::error::VoteSyncError;

/// Remote aggregator of thread votes.
#[async_trait]
pub trait VoteNotifier: Send + Sync {
    /// Replaces `prior` with `vote` for this client's alumnus.
    async fn submit_vote(
        &self,
        thread_id: ThreadId,
        prior: Vote,
        vote: Vote,
    ) -> Result<VoteTally, VoteSyncError>;

    async fn fetch_tally(&self, thread_id: ThreadId) -> Result<VoteTally, VoteSyncError>;
}

pub struct HttpVoteNotifier {
    http: Client,
    base_url: Url,
    alumni_id: AlumniId,
}

#[derive(Serialize)]
struct TallyQuery {
    alumni_id: i64,
}

impl HttpVoteNotifier {
    pub fn new(server_url: &str, alumni_id: AlumniId) -> anyhow::Result<Self> {
        Self::with_client(Client::new(), server_url, alumni_id)
    }

    pub fn with_client(
        http: Client,
        server_url: &str,
        alumni_id: AlumniId,
    ) -> anyhow::Result<Self> {
        let mut raw = server_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url =
            Url::parse(&raw).with_context(|| format!("invalid server url '{server_url}'"))?;
        Ok(Self {
            http,
            base_url,
            alumni_id,
        })
    }

    pub fn alumni_id(&self) -> AlumniId {
        self.alumni_id
    }

    fn votes_url(&self, thread_id: ThreadId) -> Result<Url, VoteSyncError> {
        self.base_url
            .join(&format!("threads/{}/votes", thread_id.0))
            .map_err(|e| VoteSyncError::Validation(e.to_string()))
    }
}

#[async_trait]
impl VoteNotifier for HttpVoteNotifier {
    async fn submit_vote(
        &self,
        thread_id: ThreadId,
        prior: Vote,
        vote: Vote,
    ) -> Result<VoteTally, VoteSyncError> {
        let response = self
            .http
            .post(self.votes_url(thread_id)?)
            .json(&SubmitVoteRequest {
                alumni_id: self.alumni_id,
                vote,
                prior: Some(prior),
            })
            .send()
            .await
            .map_err(|e| VoteSyncError::Network(e.to_string()))?;
        read_tally(response).await
    }

    async fn fetch_tally(&self, thread_id: ThreadId) -> Result<VoteTally, VoteSyncError> {
        let response = self
            .http
            .get(self.votes_url(thread_id)?)
            .query(&TallyQuery {
                alumni_id: self.alumni_id.0,
            })
            .send()
            .await
            .map_err(|e| VoteSyncError::Network(e.to_string()))?;
        read_tally(response).await
    }
}

async fn read_tally(response: Response) -> Result<VoteTally, VoteSyncError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<VoteTally>()
            .await
            .map_err(|e| VoteSyncError::Validation(format!("malformed vote tally: {e}")));
    }

    match response.json::<ApiError>().await {
        Ok(err) => Err(ApiException::new(err.code, err.message).into()),
        Err(_) => Err(classify_status(status)),
    }
}

fn classify_status(status: StatusCode) -> VoteSyncError {
    let message = status.to_string();
    match status {
        StatusCode::CONFLICT => VoteSyncError::Conflict(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            VoteSyncError::Network(message)
        }
        s if s.is_client_error() => VoteSyncError::Validation(message),
        _ => VoteSyncError::Network(message),
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
