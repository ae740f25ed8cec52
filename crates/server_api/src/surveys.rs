//! Survey authoring, participation and response aggregation.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use shared::{
    domain::{AlumniId, QuestionId, ResponseId, SurveyId},
    error::ApiError,
    protocol::{
        MessageResponse, NewSurvey, OptionView, QuestionResponses, QuestionView, RespondentAnswer,
        SectionResponses, SectionView, SubmitSurveyResponseRequest, SurveyCreatedResponse,
        SurveyDetail, SurveyListResponse, SurveyQuestions, SurveyResponses,
        SurveyResponsesEnvelope, SurveySummary,
    },
};
use storage::{StoredAnswer, StoredOption, StoredQuestion, StoredSurvey};
use tracing::info;

use crate::{internal, ApiContext};

pub async fn save_survey(
    ctx: &ApiContext,
    survey: &NewSurvey,
) -> Result<SurveyCreatedResponse, ApiError> {
    let stored = ctx
        .storage
        .insert_survey(survey, Utc::now())
        .await
        .map_err(internal)?;
    info!(survey_id = %stored.survey_id, sections = survey.sections.len(), "survey created");

    Ok(SurveyCreatedResponse {
        message: "Survey with sections and questions created successfully.".to_string(),
        survey: to_summary(stored),
    })
}

pub async fn delete_survey(
    ctx: &ApiContext,
    survey_id: SurveyId,
) -> Result<MessageResponse, ApiError> {
    let deleted = ctx
        .storage
        .delete_survey(survey_id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(survey_not_found());
    }
    info!(%survey_id, "survey deleted");

    Ok(MessageResponse {
        message: "Survey and its associated questions and options deleted successfully"
            .to_string(),
    })
}

pub async fn survey_detail(
    ctx: &ApiContext,
    survey_id: SurveyId,
) -> Result<SurveyDetail, ApiError> {
    let survey = load_survey(ctx, survey_id).await?;
    let sections = ctx
        .storage
        .list_sections(survey_id)
        .await
        .map_err(internal)?;
    let questions = ctx
        .storage
        .list_questions(survey_id)
        .await
        .map_err(internal)?;
    let options = ctx
        .storage
        .list_options(survey_id)
        .await
        .map_err(internal)?;
    let mut options_by_question = group_options(options);

    let sections = sections
        .into_iter()
        .map(|section| SectionView {
            questions: questions
                .iter()
                .filter(|q| q.section_id == section.section_id)
                .map(|q| question_view(q, &mut options_by_question))
                .collect(),
            section_id: section.section_id,
            section_title: section.section_title,
            section_description: section.section_description,
        })
        .collect();

    Ok(SurveyDetail {
        survey: survey.title,
        description: survey.description,
        start_date: survey.start_date,
        end_date: survey.end_date,
        sections,
    })
}

pub async fn list_all_surveys(ctx: &ApiContext) -> Result<SurveyListResponse, ApiError> {
    let surveys = ctx.storage.list_surveys().await.map_err(internal)?;
    survey_list(surveys, "No surveys found")
}

pub async fn list_unanswered_surveys(
    ctx: &ApiContext,
    alumni_id: AlumniId,
) -> Result<SurveyListResponse, ApiError> {
    let surveys = ctx
        .storage
        .list_surveys_for_alumnus(alumni_id, false)
        .await
        .map_err(internal)?;
    survey_list(surveys, "No surveys available for you to answer.")
}

pub async fn list_answered_surveys(
    ctx: &ApiContext,
    alumni_id: AlumniId,
) -> Result<SurveyListResponse, ApiError> {
    let surveys = ctx
        .storage
        .list_surveys_for_alumnus(alumni_id, true)
        .await
        .map_err(internal)?;
    survey_list(surveys, "You have not answered any surveys yet.")
}

/// Flat question list used when an alumnus fills in a survey.
pub async fn survey_questions(
    ctx: &ApiContext,
    survey_id: SurveyId,
) -> Result<SurveyQuestions, ApiError> {
    let survey = load_survey(ctx, survey_id).await?;
    let questions = ctx
        .storage
        .list_questions(survey_id)
        .await
        .map_err(internal)?;
    let options = ctx
        .storage
        .list_options(survey_id)
        .await
        .map_err(internal)?;
    let mut options_by_question = group_options(options);

    Ok(SurveyQuestions {
        survey: to_summary(survey),
        questions: questions
            .iter()
            .map(|q| question_view(q, &mut options_by_question))
            .collect(),
    })
}

pub async fn submit_survey_response(
    ctx: &ApiContext,
    survey_id: SurveyId,
    req: &SubmitSurveyResponseRequest,
) -> Result<MessageResponse, ApiError> {
    load_survey(ctx, survey_id).await?;

    let already_responded = ctx
        .storage
        .has_responded(survey_id, req.alumni_id)
        .await
        .map_err(internal)?;
    if already_responded {
        return Err(already_submitted());
    }

    ctx.storage
        .load_alumnus(req.alumni_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("alumnus not found"))?;

    if req.responses.is_empty() {
        return Err(ApiError::validation("responses must not be empty"));
    }

    let questions: HashSet<QuestionId> = ctx
        .storage
        .list_questions(survey_id)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|q| q.question_id)
        .collect();
    let options: HashMap<_, _> = ctx
        .storage
        .list_options(survey_id)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|o| (o.option_id, o.question_id))
        .collect();

    for answer in &req.responses {
        if !questions.contains(&answer.question_id) {
            return Err(ApiError::validation(format!(
                "question {} does not belong to the specified survey",
                answer.question_id
            )));
        }
        if let Some(option_id) = answer.option_id {
            if options.get(&option_id) != Some(&answer.question_id) {
                return Err(ApiError::validation(format!(
                    "option {option_id} is not an option of question {}",
                    answer.question_id
                )));
            }
        }
    }

    ctx.storage
        .insert_feedback_response(survey_id, req.alumni_id, &req.responses, Utc::now())
        .await
        .map_err(internal)?
        .ok_or_else(already_submitted)?;
    info!(%survey_id, alumni_id = %req.alumni_id, answers = req.responses.len(), "survey response recorded");

    Ok(MessageResponse {
        message: "Survey responses submitted successfully.".to_string(),
    })
}

/// Every respondent's answer to every question, grouped by section.
pub async fn survey_responses(
    ctx: &ApiContext,
    survey_id: SurveyId,
) -> Result<SurveyResponsesEnvelope, ApiError> {
    let survey = load_survey(ctx, survey_id).await?;
    let sections = ctx
        .storage
        .list_sections(survey_id)
        .await
        .map_err(internal)?;
    let questions = ctx
        .storage
        .list_questions(survey_id)
        .await
        .map_err(internal)?;
    let feedback = ctx
        .storage
        .list_feedback_responses(survey_id)
        .await
        .map_err(internal)?;
    let answers = ctx
        .storage
        .list_answers(survey_id)
        .await
        .map_err(internal)?;

    // First answer wins when a respondent answered the same question twice.
    let mut answer_index: HashMap<(ResponseId, QuestionId), StoredAnswer> = HashMap::new();
    for answer in answers {
        answer_index
            .entry((answer.response_id, answer.question_id))
            .or_insert(answer);
    }

    let sections = sections
        .into_iter()
        .map(|section| SectionResponses {
            questions: questions
                .iter()
                .filter(|q| q.section_id == section.section_id)
                .map(|q| QuestionResponses {
                    question_id: q.question_id,
                    question_text: q.question_text.clone(),
                    responses: feedback
                        .iter()
                        .map(|f| {
                            let answer = answer_index.get(&(f.response_id, q.question_id));
                            RespondentAnswer {
                                alumni_id: f.respondent.alumni_id,
                                alumni_email: f.respondent.email.clone(),
                                alumni_first_name: f.respondent.first_name.clone(),
                                alumni_last_name: f.respondent.last_name.clone(),
                                response_text: answer.and_then(|a| a.response_text.clone()),
                                option_text: answer.and_then(|a| a.option_text.clone()),
                                option_value: answer.and_then(|a| a.option_value),
                            }
                        })
                        .collect(),
                })
                .collect(),
            section_id: section.section_id,
            section_title: section.section_title,
        })
        .collect();

    Ok(SurveyResponsesEnvelope {
        success: true,
        data: SurveyResponses {
            survey_id: survey.survey_id,
            title: survey.title,
            sections,
        },
    })
}

async fn load_survey(ctx: &ApiContext, survey_id: SurveyId) -> Result<StoredSurvey, ApiError> {
    ctx.storage
        .load_survey(survey_id)
        .await
        .map_err(internal)?
        .ok_or_else(survey_not_found)
}

fn survey_list(
    surveys: Vec<StoredSurvey>,
    empty_message: &str,
) -> Result<SurveyListResponse, ApiError> {
    if surveys.is_empty() {
        return Err(ApiError::not_found(empty_message));
    }
    Ok(SurveyListResponse {
        success: true,
        surveys: surveys.into_iter().map(to_summary).collect(),
    })
}

fn group_options(options: Vec<StoredOption>) -> HashMap<QuestionId, Vec<OptionView>> {
    let mut grouped: HashMap<QuestionId, Vec<OptionView>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id).or_default().push(OptionView {
            option_id: option.option_id,
            option_text: option.option_text,
            option_value: option.option_value,
        });
    }
    grouped
}

fn question_view(
    question: &StoredQuestion,
    options_by_question: &mut HashMap<QuestionId, Vec<OptionView>>,
) -> QuestionView {
    QuestionView {
        question_id: question.question_id,
        question_text: question.question_text.clone(),
        question_type: question.question_type,
        options: options_by_question
            .remove(&question.question_id)
            .unwrap_or_default(),
    }
}

fn to_summary(survey: StoredSurvey) -> SurveySummary {
    SurveySummary {
        survey_id: survey.survey_id,
        title: survey.title,
        description: survey.description,
        start_date: survey.start_date,
        end_date: survey.end_date,
        creation_date: survey.creation_date,
    }
}

fn survey_not_found() -> ApiError {
    ApiError::not_found("Survey not found")
}

fn already_submitted() -> ApiError {
    ApiError::conflict("You have already submitted a response for this survey.")
}

#[cfg(test)]
#[path = "tests/surveys_tests.rs"]
mod tests;
