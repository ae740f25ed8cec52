use super::*;
use shared::protocol::{NewSurveyOption, NewSurveyQuestion, NewSurveySection};

async fn storage_with_thread() -> (Storage, AlumniId, ThreadId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let author = storage
        .create_alumnus("ada@alumni.test", "Ada", "Lovelace")
        .await
        .expect("alumnus");
    let thread = storage
        .create_thread(author, "Reunion venue", Some("Where should we meet?"))
        .await
        .expect("thread");
    (storage, author, thread)
}

fn sample_survey() -> NewSurvey {
    NewSurvey {
        title: "Career outcomes".to_string(),
        description: Some("Yearly check-in".to_string()),
        start_date: NaiveDate::from_ymd_opt(2024, 11, 1).expect("date"),
        end_date: NaiveDate::from_ymd_opt(2024, 12, 1).expect("date"),
        sections: vec![NewSurveySection {
            section_title: "Employment".to_string(),
            section_description: None,
            questions: vec![
                NewSurveyQuestion {
                    question_text: "Are you employed?".to_string(),
                    question_type: QuestionType::MultipleChoice,
                    options: vec![
                        NewSurveyOption {
                            option_text: "Yes".to_string(),
                            option_value: Some(1),
                        },
                        NewSurveyOption {
                            option_text: "No".to_string(),
                            option_value: Some(0),
                        },
                    ],
                },
                NewSurveyQuestion {
                    question_text: "Describe your role".to_string(),
                    question_type: QuestionType::OpenEnded,
                    options: vec![NewSurveyOption {
                        option_text: "ignored".to_string(),
                        option_value: None,
                    }],
                },
            ],
        }],
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn duplicate_tag_name_is_reported_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage.create_tag("networking").await.expect("tag");
    assert!(first.is_some());
    let second = storage.create_tag("networking").await.expect("tag");
    assert!(second.is_none());

    storage.create_tag("Careers").await.expect("tag");
    let names: Vec<String> = storage
        .list_tags()
        .await
        .expect("tags")
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["Careers".to_string(), "networking".to_string()]);
}

#[tokio::test]
async fn tags_attach_to_threads() {
    let (storage, _author, thread) = storage_with_thread().await;
    let tag = storage.create_tag("events").await.expect("tag").expect("new");
    storage.tag_thread(thread, tag).await.expect("tag thread");
    storage.tag_thread(thread, tag).await.expect("idempotent");

    let tags = storage.tags_for_thread(thread).await.expect("tags");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].tag_id, tag);
}

#[tokio::test]
async fn vote_upsert_and_retraction_update_tally() {
    let (storage, author, thread) = storage_with_thread().await;
    let bob = storage
        .create_alumnus("bob@alumni.test", "Bob", "Stone")
        .await
        .expect("alumnus");

    storage
        .apply_thread_vote(thread, author, None, Vote::Up)
        .await
        .expect("vote");
    let write = storage
        .apply_thread_vote(thread, bob, Some(Vote::None), Vote::Down)
        .await
        .expect("vote");
    let VoteWrite::Applied(tally) = write else {
        panic!("expected applied vote");
    };
    assert_eq!((tally.upvotes, tally.downvotes), (1, 1));
    assert_eq!(tally.user_vote, Vote::Down);

    storage
        .apply_thread_vote(thread, bob, Some(Vote::Down), Vote::None)
        .await
        .expect("retract");
    let seen_by_bob = storage.thread_vote_tally(thread, bob).await.expect("tally");
    assert_eq!((seen_by_bob.upvotes, seen_by_bob.downvotes), (1, 0));
    assert_eq!(seen_by_bob.user_vote, Vote::None);

    let seen_by_author = storage
        .thread_vote_tally(thread, author)
        .await
        .expect("tally");
    assert_eq!(seen_by_author.user_vote, Vote::Up);
}

#[tokio::test]
async fn mismatched_prior_vote_is_a_conflict_and_writes_nothing() {
    let (storage, author, thread) = storage_with_thread().await;
    storage
        .apply_thread_vote(thread, author, None, Vote::Up)
        .await
        .expect("vote");

    let write = storage
        .apply_thread_vote(thread, author, Some(Vote::None), Vote::Down)
        .await
        .expect("vote");
    assert_eq!(write, VoteWrite::Conflict { stored: Vote::Up });

    let tally = storage
        .thread_vote_tally(thread, author)
        .await
        .expect("tally");
    assert_eq!((tally.upvotes, tally.downvotes), (1, 0));
}

#[tokio::test]
async fn survey_tree_is_stored_with_options_only_for_choice_questions() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let stored = storage
        .insert_survey(&sample_survey(), Utc::now())
        .await
        .expect("survey");

    let sections = storage.list_sections(stored.survey_id).await.expect("sections");
    assert_eq!(sections.len(), 1);
    let questions = storage.list_questions(stored.survey_id).await.expect("questions");
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[1].question_type, QuestionType::OpenEnded);

    let options = storage.list_options(stored.survey_id).await.expect("options");
    assert_eq!(options.len(), 2);
    assert!(options
        .iter()
        .all(|o| o.question_id == questions[0].question_id));
}

#[tokio::test]
async fn feedback_response_is_accepted_once_per_alumnus() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alumnus = storage
        .create_alumnus("cy@alumni.test", "Cy", "Young")
        .await
        .expect("alumnus");
    let survey = storage
        .insert_survey(&sample_survey(), Utc::now())
        .await
        .expect("survey");
    let questions = storage.list_questions(survey.survey_id).await.expect("questions");
    let options = storage.list_options(survey.survey_id).await.expect("options");

    let answers = vec![
        QuestionAnswer {
            question_id: questions[0].question_id,
            option_id: Some(options[0].option_id),
            response_text: None,
        },
        QuestionAnswer {
            question_id: questions[1].question_id,
            option_id: None,
            response_text: Some("Engineer".to_string()),
        },
    ];

    let first = storage
        .insert_feedback_response(survey.survey_id, alumnus, &answers, Utc::now())
        .await
        .expect("response");
    assert!(first.is_some());
    assert!(storage
        .has_responded(survey.survey_id, alumnus)
        .await
        .expect("responded"));

    let second = storage
        .insert_feedback_response(survey.survey_id, alumnus, &answers, Utc::now())
        .await
        .expect("response");
    assert!(second.is_none());

    let stored_answers = storage.list_answers(survey.survey_id).await.expect("answers");
    assert_eq!(stored_answers.len(), 2);
    assert_eq!(stored_answers[0].option_text.as_deref(), Some("Yes"));
    assert_eq!(stored_answers[1].response_text.as_deref(), Some("Engineer"));
}

#[tokio::test]
async fn answered_and_unanswered_lists_partition_surveys() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alumnus = storage
        .create_alumnus("dee@alumni.test", "Dee", "Park")
        .await
        .expect("alumnus");
    let older = storage
        .insert_survey(&sample_survey(), Utc::now() - chrono::Duration::days(1))
        .await
        .expect("survey");
    let newer = storage
        .insert_survey(&sample_survey(), Utc::now())
        .await
        .expect("survey");

    storage
        .insert_feedback_response(older.survey_id, alumnus, &[], Utc::now())
        .await
        .expect("response");

    let answered = storage
        .list_surveys_for_alumnus(alumnus, true)
        .await
        .expect("answered");
    let unanswered = storage
        .list_surveys_for_alumnus(alumnus, false)
        .await
        .expect("unanswered");
    assert_eq!(answered.len(), 1);
    assert_eq!(answered[0].survey_id, older.survey_id);
    assert_eq!(unanswered.len(), 1);
    assert_eq!(unanswered[0].survey_id, newer.survey_id);

    let all = storage.list_surveys().await.expect("all");
    assert_eq!(all[0].survey_id, newer.survey_id);
}

#[tokio::test]
async fn deleting_survey_cascades_to_children() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let survey = storage
        .insert_survey(&sample_survey(), Utc::now())
        .await
        .expect("survey");

    assert!(storage.delete_survey(survey.survey_id).await.expect("delete"));
    assert!(!storage.delete_survey(survey.survey_id).await.expect("delete"));
    assert!(storage
        .load_survey(survey.survey_id)
        .await
        .expect("load")
        .is_none());
    assert!(storage
        .list_options(survey.survey_id)
        .await
        .expect("options")
        .is_empty());

    let orphaned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM survey_sections")
        .fetch_one(storage.pool())
        .await
        .expect("count");
    assert_eq!(orphaned, 0);
}
