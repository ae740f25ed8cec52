use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AlumniId, OptionId, QuestionId, QuestionType, SectionId, SurveyId, TagId, ThreadId, Vote,
    VoteDirection,
};

/// Vote aggregate for one thread as seen by one alumnus.
///
/// Doubles as the seed a vote controller is created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub thread_id: ThreadId,
    pub upvotes: i64,
    pub downvotes: i64,
    #[serde(default)]
    pub user_vote: Option<VoteDirection>,
}

impl VoteTally {
    pub fn net_score(&self) -> i64 {
        self.upvotes - self.downvotes
    }

    pub fn vote(&self) -> Vote {
        Vote::from(self.user_vote)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitVoteRequest {
    pub alumni_id: AlumniId,
    pub vote: Vote,
    /// Vote the client believes is stored; a mismatch is rejected as a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<Vote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSummary {
    pub tag_id: TagId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSurveyOption {
    pub option_text: String,
    #[serde(default)]
    pub option_value: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSurveyQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<NewSurveyOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSurveySection {
    pub section_title: String,
    #[serde(default)]
    pub section_description: Option<String>,
    pub questions: Vec<NewSurveyQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSurvey {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sections: Vec<NewSurveySection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySummary {
    pub survey_id: SurveyId,
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyCreatedResponse {
    pub message: String,
    pub survey: SurveySummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyListResponse {
    pub success: bool,
    pub surveys: Vec<SurveySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionView {
    pub option_id: OptionId,
    pub option_text: String,
    pub option_value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub question_id: QuestionId,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionView {
    pub section_id: SectionId,
    pub section_title: String,
    pub section_description: Option<String>,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyDetail {
    pub survey: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyQuestions {
    #[serde(flatten)]
    pub survey: SurveySummary,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question_id: QuestionId,
    #[serde(default)]
    pub option_id: Option<OptionId>,
    #[serde(default)]
    pub response_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSurveyResponseRequest {
    pub alumni_id: AlumniId,
    pub responses: Vec<QuestionAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondentAnswer {
    pub alumni_id: AlumniId,
    pub alumni_email: String,
    pub alumni_first_name: String,
    pub alumni_last_name: String,
    pub response_text: Option<String>,
    pub option_text: Option<String>,
    pub option_value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponses {
    pub question_id: QuestionId,
    pub question_text: String,
    pub responses: Vec<RespondentAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionResponses {
    pub section_id: SectionId,
    pub section_title: String,
    pub questions: Vec<QuestionResponses>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponses {
    pub survey_id: SurveyId,
    pub title: String,
    pub sections: Vec<SectionResponses>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponsesEnvelope {
    pub success: bool,
    pub data: SurveyResponses,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    ThreadVotesUpdated {
        thread_id: ThreadId,
        upvotes: i64,
        downvotes: i64,
    },
    TagCreated {
        tag: TagSummary,
    },
    SurveyPublished {
        survey: SurveySummary,
    },
    SurveyDeleted {
        survey_id: SurveyId,
    },
}
