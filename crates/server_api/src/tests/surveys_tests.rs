use super::*;
use chrono::NaiveDate;
use shared::{
    domain::{OptionId, QuestionType},
    error::ErrorCode,
    protocol::{NewSurveyOption, NewSurveyQuestion, NewSurveySection, QuestionAnswer},
};
use storage::Storage;

async fn setup() -> (ApiContext, AlumniId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alumnus = storage
        .create_alumnus("fay@alumni.test", "Fay", "Nguyen")
        .await
        .expect("alumnus");
    (ApiContext::new(storage), alumnus)
}

fn new_survey(title: &str) -> NewSurvey {
    NewSurvey {
        title: title.to_string(),
        description: None,
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("date"),
        end_date: NaiveDate::from_ymd_opt(2025, 2, 1).expect("date"),
        sections: vec![
            NewSurveySection {
                section_title: "About you".to_string(),
                section_description: Some("Basics".to_string()),
                questions: vec![NewSurveyQuestion {
                    question_text: "Graduation decade".to_string(),
                    question_type: QuestionType::MultipleChoice,
                    options: vec![
                        NewSurveyOption {
                            option_text: "2000s".to_string(),
                            option_value: Some(2000),
                        },
                        NewSurveyOption {
                            option_text: "2010s".to_string(),
                            option_value: Some(2010),
                        },
                    ],
                }],
            },
            NewSurveySection {
                section_title: "Feedback".to_string(),
                section_description: None,
                questions: vec![
                    NewSurveyQuestion {
                        question_text: "Rate the newsletter".to_string(),
                        question_type: QuestionType::Rating,
                        options: vec![NewSurveyOption {
                            option_text: "5".to_string(),
                            option_value: Some(5),
                        }],
                    },
                    NewSurveyQuestion {
                        question_text: "Anything else?".to_string(),
                        question_type: QuestionType::OpenEnded,
                        options: Vec::new(),
                    },
                ],
            },
        ],
    }
}

#[tokio::test]
async fn saved_survey_is_returned_as_section_tree() {
    let (ctx, _) = setup().await;
    let created = save_survey(&ctx, &new_survey("Alumni census"))
        .await
        .expect("save");

    let detail = survey_detail(&ctx, created.survey.survey_id)
        .await
        .expect("detail");
    assert_eq!(detail.survey, "Alumni census");
    assert_eq!(detail.sections.len(), 2);
    assert_eq!(detail.sections[0].questions[0].options.len(), 2);
    assert_eq!(detail.sections[1].questions.len(), 2);
    assert!(detail.sections[1].questions[1].options.is_empty());

    let flat = survey_questions(&ctx, created.survey.survey_id)
        .await
        .expect("questions");
    assert_eq!(flat.questions.len(), 3);
    assert_eq!(flat.survey.survey_id, created.survey.survey_id);
    assert_eq!(flat.survey.title, "Alumni census");
}

#[tokio::test]
async fn empty_survey_lists_are_not_found() {
    let (ctx, alumnus) = setup().await;
    let err = list_all_surveys(&ctx).await.expect_err("empty");
    assert_eq!(err.code, ErrorCode::NotFound);
    let err = list_answered_surveys(&ctx, alumnus)
        .await
        .expect_err("empty");
    assert_eq!(err.message, "You have not answered any surveys yet.");
}

#[tokio::test]
async fn alumnus_can_respond_only_once() {
    let (ctx, alumnus) = setup().await;
    let created = save_survey(&ctx, &new_survey("Events"))
        .await
        .expect("save");
    let survey_id = created.survey.survey_id;
    let questions = survey_questions(&ctx, survey_id).await.expect("questions");

    let request = SubmitSurveyResponseRequest {
        alumni_id: alumnus,
        responses: vec![
            QuestionAnswer {
                question_id: questions.questions[0].question_id,
                option_id: Some(questions.questions[0].options[1].option_id),
                response_text: None,
            },
            QuestionAnswer {
                question_id: questions.questions[2].question_id,
                option_id: None,
                response_text: Some("More meetups".to_string()),
            },
        ],
    };
    submit_survey_response(&ctx, survey_id, &request)
        .await
        .expect("first response");

    let err = submit_survey_response(&ctx, survey_id, &request)
        .await
        .expect_err("second response");
    assert_eq!(err.code, ErrorCode::Conflict);

    let unanswered = list_unanswered_surveys(&ctx, alumnus).await;
    assert!(unanswered.is_err());
    let answered = list_answered_surveys(&ctx, alumnus)
        .await
        .expect("answered");
    assert_eq!(answered.surveys.len(), 1);
}

#[tokio::test]
async fn foreign_question_and_option_are_rejected() {
    let (ctx, alumnus) = setup().await;
    let first = save_survey(&ctx, &new_survey("First")).await.expect("save");
    let second = save_survey(&ctx, &new_survey("Second")).await.expect("save");
    let second_questions = survey_questions(&ctx, second.survey.survey_id)
        .await
        .expect("questions");
    let first_questions = survey_questions(&ctx, first.survey.survey_id)
        .await
        .expect("questions");

    let foreign_question = SubmitSurveyResponseRequest {
        alumni_id: alumnus,
        responses: vec![QuestionAnswer {
            question_id: second_questions.questions[0].question_id,
            option_id: None,
            response_text: Some("x".to_string()),
        }],
    };
    let err = submit_survey_response(&ctx, first.survey.survey_id, &foreign_question)
        .await
        .expect_err("foreign question");
    assert_eq!(err.code, ErrorCode::Validation);

    let wrong_option = SubmitSurveyResponseRequest {
        alumni_id: alumnus,
        responses: vec![QuestionAnswer {
            question_id: first_questions.questions[0].question_id,
            option_id: Some(OptionId(9_999)),
            response_text: None,
        }],
    };
    let err = submit_survey_response(&ctx, first.survey.survey_id, &wrong_option)
        .await
        .expect_err("unknown option");
    assert_eq!(err.code, ErrorCode::Validation);

    let empty = SubmitSurveyResponseRequest {
        alumni_id: alumnus,
        responses: Vec::new(),
    };
    let err = submit_survey_response(&ctx, first.survey.survey_id, &empty)
        .await
        .expect_err("empty");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn responses_are_aggregated_per_question_with_nulls_for_skips() {
    let (ctx, alumnus) = setup().await;
    let other = ctx
        .storage
        .create_alumnus("gus@alumni.test", "Gus", "Hale")
        .await
        .expect("alumnus");
    let created = save_survey(&ctx, &new_survey("Newsletter"))
        .await
        .expect("save");
    let survey_id = created.survey.survey_id;
    let questions = survey_questions(&ctx, survey_id).await.expect("questions");
    let rating = &questions.questions[1];

    submit_survey_response(
        &ctx,
        survey_id,
        &SubmitSurveyResponseRequest {
            alumni_id: alumnus,
            responses: vec![QuestionAnswer {
                question_id: rating.question_id,
                option_id: Some(rating.options[0].option_id),
                response_text: None,
            }],
        },
    )
    .await
    .expect("response");
    submit_survey_response(
        &ctx,
        survey_id,
        &SubmitSurveyResponseRequest {
            alumni_id: other,
            responses: vec![QuestionAnswer {
                question_id: questions.questions[2].question_id,
                option_id: None,
                response_text: Some("Shorter please".to_string()),
            }],
        },
    )
    .await
    .expect("response");

    let envelope = survey_responses(&ctx, survey_id).await.expect("responses");
    assert!(envelope.success);
    let feedback_section = &envelope.data.sections[1];
    let rating_answers = &feedback_section.questions[0].responses;
    assert_eq!(rating_answers.len(), 2);
    assert_eq!(rating_answers[0].alumni_email, "fay@alumni.test");
    assert_eq!(rating_answers[0].option_value, Some(5));
    assert_eq!(rating_answers[1].option_text, None);

    let open_answers = &feedback_section.questions[1].responses;
    assert_eq!(open_answers[1].response_text.as_deref(), Some("Shorter please"));
    assert_eq!(open_answers[0].response_text, None);
}

#[tokio::test]
async fn deleting_unknown_survey_is_not_found() {
    let (ctx, _) = setup().await;
    let created = save_survey(&ctx, &new_survey("Temp")).await.expect("save");
    delete_survey(&ctx, created.survey.survey_id)
        .await
        .expect("delete");
    let err = delete_survey(&ctx, created.survey.survey_id)
        .await
        .expect_err("gone");
    assert_eq!(err.code, ErrorCode::NotFound);
    let err = survey_detail(&ctx, created.survey.survey_id)
        .await
        .expect_err("gone");
    assert_eq!(err.code, ErrorCode::NotFound);
}
