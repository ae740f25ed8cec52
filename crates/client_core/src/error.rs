use shared::{
    domain::ThreadId,
    error::{ApiException, ErrorCode},
};
use thiserror::Error;

/// Why an outbound vote notification did not land.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteSyncError {
    #[error("vote notification could not reach the server: {0}")]
    Network(String),
    #[error("server holds a different vote than expected: {0}")]
    Conflict(String),
    #[error("server rejected the vote: {0}")]
    Validation(String),
}

impl VoteSyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, VoteSyncError::Network(_))
    }
}

impl From<ApiException> for VoteSyncError {
    fn from(value: ApiException) -> Self {
        match value.code {
            ErrorCode::Conflict => VoteSyncError::Conflict(value.message),
            ErrorCode::NotFound | ErrorCode::Validation => VoteSyncError::Validation(value.message),
            ErrorCode::Internal => VoteSyncError::Network(value.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("vote controller for thread {0} has been shut down")]
pub struct ControllerClosed(pub ThreadId);
