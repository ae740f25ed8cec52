use shared::error::{ApiError, ErrorCode};
use storage::Storage;

mod surveys;
mod tags;
mod votes;

pub use surveys::{
    delete_survey, list_all_surveys, list_answered_surveys, list_unanswered_surveys, save_survey,
    submit_survey_response, survey_detail, survey_questions, survey_responses,
};
pub use tags::{create_tag, list_tags};
pub use votes::{submit_vote, thread_votes};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = %err, "storage operation failed");
    ApiError::new(ErrorCode::Internal, err.to_string())
}
