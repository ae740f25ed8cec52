use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{
        AlumniId, OptionId, QuestionId, QuestionType, ResponseId, SectionId, SurveyId, TagId,
        ThreadId, Vote,
    },
    protocol::{NewSurvey, QuestionAnswer},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredAlumnus {
    pub alumni_id: AlumniId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct StoredTag {
    pub tag_id: TagId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredVoteTally {
    pub thread_id: ThreadId,
    pub upvotes: i64,
    pub downvotes: i64,
    pub user_vote: Vote,
}

/// Result of a compare-and-set on one alumnus's thread vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteWrite {
    Applied(StoredVoteTally),
    Conflict { stored: Vote },
}

#[derive(Debug, Clone)]
pub struct StoredSurvey {
    pub survey_id: SurveyId,
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredSection {
    pub section_id: SectionId,
    pub survey_id: SurveyId,
    pub section_title: String,
    pub section_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredQuestion {
    pub question_id: QuestionId,
    pub section_id: SectionId,
    pub question_text: String,
    pub question_type: QuestionType,
}

#[derive(Debug, Clone)]
pub struct StoredOption {
    pub option_id: OptionId,
    pub question_id: QuestionId,
    pub option_text: String,
    pub option_value: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct StoredFeedbackResponse {
    pub response_id: ResponseId,
    pub respondent: StoredAlumnus,
    pub response_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredAnswer {
    pub response_id: ResponseId,
    pub question_id: QuestionId,
    pub response_text: Option<String>,
    pub option_text: Option<String>,
    pub option_value: Option<i64>,
}

const SURVEY_COLUMNS: &str =
    "s.survey_id, s.title, s.description, s.start_date, s.end_date, s.creation_date";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_alumnus(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<AlumniId> {
        let rec = sqlx::query(
            "INSERT INTO alumni (email, first_name, last_name) VALUES (?, ?, ?)
             ON CONFLICT(email) DO UPDATE SET first_name=excluded.first_name, last_name=excluded.last_name
             RETURNING alumni_id",
        )
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(AlumniId(rec.get::<i64, _>(0)))
    }

    pub async fn load_alumnus(&self, alumni_id: AlumniId) -> Result<Option<StoredAlumnus>> {
        let row = sqlx::query(
            "SELECT alumni_id, email, first_name, last_name FROM alumni WHERE alumni_id = ?",
        )
        .bind(alumni_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| alumnus_from_row(&r, 0)))
    }

    /// Returns `None` when a tag with the same name already exists.
    pub async fn create_tag(&self, name: &str) -> Result<Option<TagId>> {
        let row = sqlx::query(
            "INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING RETURNING tag_id",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| TagId(r.get::<i64, _>(0))))
    }

    pub async fn list_tags(&self) -> Result<Vec<StoredTag>> {
        let rows = sqlx::query("SELECT tag_id, name FROM tags ORDER BY lower(name) ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredTag {
                tag_id: TagId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
            })
            .collect())
    }

    pub async fn create_thread(
        &self,
        author_id: AlumniId,
        title: &str,
        description: Option<&str>,
    ) -> Result<ThreadId> {
        let rec = sqlx::query(
            "INSERT INTO threads (author_id, title, description) VALUES (?, ?, ?) RETURNING thread_id",
        )
        .bind(author_id.0)
        .bind(title)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(ThreadId(rec.get::<i64, _>(0)))
    }

    pub async fn tag_thread(&self, thread_id: ThreadId, tag_id: TagId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO thread_tags (thread_id, tag_id) VALUES (?, ?)")
            .bind(thread_id.0)
            .bind(tag_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn tags_for_thread(&self, thread_id: ThreadId) -> Result<Vec<StoredTag>> {
        let rows = sqlx::query(
            "SELECT t.tag_id, t.name
             FROM tags t
             INNER JOIN thread_tags tt ON tt.tag_id = t.tag_id
             WHERE tt.thread_id = ?
             ORDER BY lower(t.name) ASC",
        )
        .bind(thread_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredTag {
                tag_id: TagId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
            })
            .collect())
    }

    pub async fn thread_exists(&self, thread_id: ThreadId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM threads WHERE thread_id = ?")
            .bind(thread_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn thread_vote_tally(
        &self,
        thread_id: ThreadId,
        alumni_id: AlumniId,
    ) -> Result<StoredVoteTally> {
        let mut conn = self.pool.acquire().await?;
        let (upvotes, downvotes) = count_thread_votes(&mut conn, thread_id).await?;
        let user_vote = stored_vote(&mut conn, thread_id, alumni_id).await?;
        Ok(StoredVoteTally {
            thread_id,
            upvotes,
            downvotes,
            user_vote,
        })
    }

    /// Replaces the alumnus's vote with `next`, refusing when `prior` is given
    /// and differs from what is stored. `Vote::None` removes the row.
    pub async fn apply_thread_vote(
        &self,
        thread_id: ThreadId,
        alumni_id: AlumniId,
        prior: Option<Vote>,
        next: Vote,
    ) -> Result<VoteWrite> {
        let mut tx = self.pool.begin().await?;

        let stored = stored_vote(&mut tx, thread_id, alumni_id).await?;
        if let Some(prior) = prior {
            if prior != stored {
                tx.rollback().await?;
                return Ok(VoteWrite::Conflict { stored });
            }
        }

        match next {
            Vote::None => {
                sqlx::query("DELETE FROM thread_votes WHERE thread_id = ? AND alumni_id = ?")
                    .bind(thread_id.0)
                    .bind(alumni_id.0)
                    .execute(&mut *tx)
                    .await?;
            }
            Vote::Up | Vote::Down => {
                sqlx::query(
                    "INSERT INTO thread_votes (thread_id, alumni_id, vote) VALUES (?, ?, ?)
                     ON CONFLICT(thread_id, alumni_id) DO UPDATE SET vote=excluded.vote, updated_at=CURRENT_TIMESTAMP",
                )
                .bind(thread_id.0)
                .bind(alumni_id.0)
                .bind(next.as_str())
                .execute(&mut *tx)
                .await
                .context("failed to store thread vote")?;
            }
        }

        let (upvotes, downvotes) = count_thread_votes(&mut tx, thread_id).await?;
        tx.commit().await?;

        Ok(VoteWrite::Applied(StoredVoteTally {
            thread_id,
            upvotes,
            downvotes,
            user_vote: next,
        }))
    }

    /// Stores a survey with all of its sections, questions and options atomically.
    pub async fn insert_survey(
        &self,
        survey: &NewSurvey,
        creation_date: DateTime<Utc>,
    ) -> Result<StoredSurvey> {
        let mut tx = self.pool.begin().await?;

        let rec = sqlx::query(
            "INSERT INTO surveys (title, description, creation_date, start_date, end_date)
             VALUES (?, ?, ?, ?, ?) RETURNING survey_id",
        )
        .bind(&survey.title)
        .bind(survey.description.as_deref())
        .bind(creation_date)
        .bind(survey.start_date)
        .bind(survey.end_date)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create survey")?;
        let survey_id = SurveyId(rec.get::<i64, _>(0));

        for section in &survey.sections {
            let section_id = insert_section(&mut tx, survey_id, section).await?;
            for question in &section.questions {
                let rec = sqlx::query(
                    "INSERT INTO survey_questions (survey_id, section_id, question_text, question_type)
                     VALUES (?, ?, ?, ?) RETURNING question_id",
                )
                .bind(survey_id.0)
                .bind(section_id.0)
                .bind(&question.question_text)
                .bind(question.question_type.as_str())
                .fetch_one(&mut *tx)
                .await
                .with_context(|| format!("failed to create question for section {section_id}"))?;
                let question_id = rec.get::<i64, _>(0);

                if !question.question_type.accepts_options() {
                    continue;
                }
                for option in &question.options {
                    sqlx::query(
                        "INSERT INTO survey_options (question_id, option_text, option_value) VALUES (?, ?, ?)",
                    )
                    .bind(question_id)
                    .bind(&option.option_text)
                    .bind(option.option_value)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        Ok(StoredSurvey {
            survey_id,
            title: survey.title.clone(),
            description: survey.description.clone(),
            start_date: survey.start_date,
            end_date: survey.end_date,
            creation_date,
        })
    }

    /// Deletes a survey; sections, questions, options and responses cascade.
    pub async fn delete_survey(&self, survey_id: SurveyId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM surveys WHERE survey_id = ?")
            .bind(survey_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn load_survey(&self, survey_id: SurveyId) -> Result<Option<StoredSurvey>> {
        let row = sqlx::query(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys s WHERE s.survey_id = ?"
        ))
        .bind(survey_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| survey_from_row(&r)))
    }

    pub async fn list_surveys(&self) -> Result<Vec<StoredSurvey>> {
        let rows = sqlx::query(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys s ORDER BY s.creation_date DESC, s.survey_id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(survey_from_row).collect())
    }

    /// Surveys the alumnus has (`answered = true`) or has not yet responded to.
    pub async fn list_surveys_for_alumnus(
        &self,
        alumni_id: AlumniId,
        answered: bool,
    ) -> Result<Vec<StoredSurvey>> {
        let filter = if answered { "EXISTS" } else { "NOT EXISTS" };
        let rows = sqlx::query(&format!(
            "SELECT {SURVEY_COLUMNS}
             FROM surveys s
             WHERE {filter} (
                 SELECT 1 FROM feedback_responses f
                 WHERE f.survey_id = s.survey_id AND f.alumni_id = ?
             )
             ORDER BY s.creation_date DESC, s.survey_id DESC"
        ))
        .bind(alumni_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(survey_from_row).collect())
    }

    pub async fn list_sections(&self, survey_id: SurveyId) -> Result<Vec<StoredSection>> {
        let rows = sqlx::query(
            "SELECT section_id, survey_id, section_title, section_description
             FROM survey_sections
             WHERE survey_id = ?
             ORDER BY section_id ASC",
        )
        .bind(survey_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredSection {
                section_id: SectionId(r.get::<i64, _>(0)),
                survey_id: SurveyId(r.get::<i64, _>(1)),
                section_title: r.get::<String, _>(2),
                section_description: r.get::<Option<String>, _>(3),
            })
            .collect())
    }

    pub async fn list_questions(&self, survey_id: SurveyId) -> Result<Vec<StoredQuestion>> {
        let rows = sqlx::query(
            "SELECT question_id, section_id, question_text, question_type
             FROM survey_questions
             WHERE survey_id = ?
             ORDER BY question_id ASC",
        )
        .bind(survey_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let raw_type = r.get::<String, _>(3);
                let question_type = QuestionType::from_str(&raw_type).map_err(|e| anyhow!(e))?;
                Ok(StoredQuestion {
                    question_id: QuestionId(r.get::<i64, _>(0)),
                    section_id: SectionId(r.get::<i64, _>(1)),
                    question_text: r.get::<String, _>(2),
                    question_type,
                })
            })
            .collect()
    }

    pub async fn list_options(&self, survey_id: SurveyId) -> Result<Vec<StoredOption>> {
        let rows = sqlx::query(
            "SELECT o.option_id, o.question_id, o.option_text, o.option_value
             FROM survey_options o
             INNER JOIN survey_questions q ON q.question_id = o.question_id
             WHERE q.survey_id = ?
             ORDER BY o.option_id ASC",
        )
        .bind(survey_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredOption {
                option_id: OptionId(r.get::<i64, _>(0)),
                question_id: QuestionId(r.get::<i64, _>(1)),
                option_text: r.get::<String, _>(2),
                option_value: r.get::<Option<i64>, _>(3),
            })
            .collect())
    }

    pub async fn has_responded(&self, survey_id: SurveyId, alumni_id: AlumniId) -> Result<bool> {
        let row =
            sqlx::query("SELECT 1 FROM feedback_responses WHERE survey_id = ? AND alumni_id = ?")
                .bind(survey_id.0)
                .bind(alumni_id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Records one alumnus's answers. Returns `None` if they already responded.
    pub async fn insert_feedback_response(
        &self,
        survey_id: SurveyId,
        alumni_id: AlumniId,
        answers: &[QuestionAnswer],
        response_date: DateTime<Utc>,
    ) -> Result<Option<ResponseId>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO feedback_responses (survey_id, alumni_id, response_date) VALUES (?, ?, ?)
             ON CONFLICT(survey_id, alumni_id) DO NOTHING
             RETURNING response_id",
        )
        .bind(survey_id.0)
        .bind(alumni_id.0)
        .bind(response_date)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = inserted else {
            tx.rollback().await?;
            return Ok(None);
        };
        let response_id = ResponseId(row.get::<i64, _>(0));

        for answer in answers {
            sqlx::query(
                "INSERT INTO question_responses (response_id, question_id, option_id, response_text)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(response_id.0)
            .bind(answer.question_id.0)
            .bind(answer.option_id.map(|id| id.0))
            .bind(answer.response_text.as_deref())
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!("failed to store answer for question {}", answer.question_id)
            })?;
        }

        tx.commit().await?;
        Ok(Some(response_id))
    }

    pub async fn list_feedback_responses(
        &self,
        survey_id: SurveyId,
    ) -> Result<Vec<StoredFeedbackResponse>> {
        let rows = sqlx::query(
            "SELECT a.alumni_id, a.email, a.first_name, a.last_name, f.response_id, f.response_date
             FROM feedback_responses f
             INNER JOIN alumni a ON a.alumni_id = f.alumni_id
             WHERE f.survey_id = ?
             ORDER BY f.response_id ASC",
        )
        .bind(survey_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredFeedbackResponse {
                respondent: alumnus_from_row(&r, 0),
                response_id: ResponseId(r.get::<i64, _>(4)),
                response_date: r.get::<DateTime<Utc>, _>(5),
            })
            .collect())
    }

    pub async fn list_answers(&self, survey_id: SurveyId) -> Result<Vec<StoredAnswer>> {
        let rows = sqlx::query(
            "SELECT qr.response_id, qr.question_id, qr.response_text, o.option_text, o.option_value
             FROM question_responses qr
             INNER JOIN feedback_responses f ON f.response_id = qr.response_id
             LEFT JOIN survey_options o ON o.option_id = qr.option_id
             WHERE f.survey_id = ?
             ORDER BY qr.question_response_id ASC",
        )
        .bind(survey_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredAnswer {
                response_id: ResponseId(r.get::<i64, _>(0)),
                question_id: QuestionId(r.get::<i64, _>(1)),
                response_text: r.get::<Option<String>, _>(2),
                option_text: r.get::<Option<String>, _>(3),
                option_value: r.get::<Option<i64>, _>(4),
            })
            .collect())
    }
}

async fn insert_section(
    tx: &mut Transaction<'_, Sqlite>,
    survey_id: SurveyId,
    section: &shared::protocol::NewSurveySection,
) -> Result<SectionId> {
    let rec = sqlx::query(
        "INSERT INTO survey_sections (survey_id, section_title, section_description)
         VALUES (?, ?, ?) RETURNING section_id",
    )
    .bind(survey_id.0)
    .bind(&section.section_title)
    .bind(section.section_description.as_deref())
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("failed to create section for survey {survey_id}"))?;
    Ok(SectionId(rec.get::<i64, _>(0)))
}

async fn count_thread_votes(
    conn: &mut sqlx::SqliteConnection,
    thread_id: ThreadId,
) -> Result<(i64, i64)> {
    let row = sqlx::query(
        "SELECT
             COALESCE(SUM(CASE WHEN vote = 'upvote' THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN vote = 'downvote' THEN 1 ELSE 0 END), 0)
         FROM thread_votes
         WHERE thread_id = ?",
    )
    .bind(thread_id.0)
    .fetch_one(&mut *conn)
    .await?;
    Ok((row.get::<i64, _>(0), row.get::<i64, _>(1)))
}

async fn stored_vote(
    conn: &mut sqlx::SqliteConnection,
    thread_id: ThreadId,
    alumni_id: AlumniId,
) -> Result<Vote> {
    let row = sqlx::query("SELECT vote FROM thread_votes WHERE thread_id = ? AND alumni_id = ?")
        .bind(thread_id.0)
        .bind(alumni_id.0)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(match row.map(|r| r.get::<String, _>(0)).as_deref() {
        Some("upvote") => Vote::Up,
        Some("downvote") => Vote::Down,
        _ => Vote::None,
    })
}

fn alumnus_from_row(r: &SqliteRow, offset: usize) -> StoredAlumnus {
    StoredAlumnus {
        alumni_id: AlumniId(r.get::<i64, _>(offset)),
        email: r.get::<String, _>(offset + 1),
        first_name: r.get::<String, _>(offset + 2),
        last_name: r.get::<String, _>(offset + 3),
    }
}

fn survey_from_row(r: &SqliteRow) -> StoredSurvey {
    StoredSurvey {
        survey_id: SurveyId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        description: r.get::<Option<String>, _>(2),
        start_date: r.get::<NaiveDate, _>(3),
        end_date: r.get::<NaiveDate, _>(4),
        creation_date: r.get::<DateTime<Utc>, _>(5),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
