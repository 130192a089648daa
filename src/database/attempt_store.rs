use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::{Answer, AnswerPayload};
use crate::models::test_attempt::{AttemptStatus, TestAttempt};

/// Result of the conditional answer insert.
#[derive(Debug)]
pub enum InsertAnswerOutcome {
    Inserted(Answer),
    Duplicate,
    NotInProgress(AttemptStatus),
    AttemptMissing,
}

/// Result of a conditional status transition out of `in_progress`.
#[derive(Debug)]
pub enum TransitionOutcome {
    Transitioned(TestAttempt),
    AlreadyTerminal(AttemptStatus),
    AttemptMissing,
}

/// Durable attempts and answers. Every mutating method is atomic with respect
/// to the others on the same attempt.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn create_attempt(&self, attempt: &TestAttempt) -> Result<TestAttempt>;

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>>;

    /// Attempts of one user, newest first, with the total count before paging.
    async fn list_attempts(
        &self,
        user_id: Uuid,
        test_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TestAttempt>, i64)>;

    async fn list_in_progress(&self) -> Result<Vec<TestAttempt>>;

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>>;

    async fn find_answer(&self, attempt_id: Uuid, question_id: Uuid) -> Result<Option<Answer>>;

    /// Inserts the answer only if the attempt is still in progress and the
    /// question has no answer yet, as one atomic step.
    async fn insert_answer_if_absent(&self, answer: &Answer) -> Result<InsertAnswerOutcome>;

    /// Moves an in-progress attempt to `completed`, scoring it from the answers
    /// stored at commit time.
    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        max_score: i32,
        completed_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    async fn abandon_attempt(&self, attempt_id: Uuid, at: DateTime<Utc>) -> Result<TransitionOutcome>;
}

#[derive(Debug, FromRow)]
struct AttemptRow {
    id: Uuid,
    test_id: Uuid,
    user_id: Uuid,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    score: Option<i32>,
    max_score: Option<i32>,
}

impl TryFrom<AttemptRow> for TestAttempt {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        Ok(TestAttempt {
            id: row.id,
            test_id: row.test_id,
            user_id: row.user_id,
            status: row.status.parse()?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            score: row.score,
            max_score: row.max_score,
        })
    }
}

#[derive(Debug, FromRow)]
struct AnswerRow {
    id: Uuid,
    attempt_id: Uuid,
    question_id: Uuid,
    selected_options: Option<Json<Vec<u32>>>,
    text_answer: Option<String>,
    is_correct: bool,
    points_earned: i32,
    answered_at: DateTime<Utc>,
}

impl TryFrom<AnswerRow> for Answer {
    type Error = Error;

    fn try_from(row: AnswerRow) -> Result<Self> {
        let answer = match (row.selected_options, row.text_answer) {
            (Some(Json(selected)), None) => AnswerPayload::SelectedOptions(selected),
            (None, Some(text)) => AnswerPayload::TextAnswer(text),
            _ => {
                return Err(Error::Integrity(format!(
                    "answer {} must hold exactly one of selected_options and text_answer",
                    row.id
                )))
            }
        };
        Ok(Answer {
            id: row.id,
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            answer,
            is_correct: row.is_correct,
            points_earned: row.points_earned,
            answered_at: row.answered_at,
        })
    }
}

fn payload_columns(payload: &AnswerPayload) -> (Option<Json<Vec<u32>>>, Option<String>) {
    match payload {
        AnswerPayload::SelectedOptions(selected) => (Some(Json(selected.clone())), None),
        AnswerPayload::TextAnswer(text) => (None, Some(text.clone())),
    }
}

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_attempt(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        attempt_id: Uuid,
    ) -> Result<Option<TestAttempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"SELECT * FROM test_attempts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut **tx)
        .await?;
        row.map(TestAttempt::try_from).transpose()
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn create_attempt(&self, attempt: &TestAttempt) -> Result<TestAttempt> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            INSERT INTO test_attempts (id, test_id, user_id, status, started_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.test_id)
        .bind(attempt.user_id)
        .bind(attempt.status.as_str())
        .bind(attempt.started_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(r#"SELECT * FROM test_attempts WHERE id = $1"#)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TestAttempt::try_from).transpose()
    }

    async fn list_attempts(
        &self,
        user_id: Uuid,
        test_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TestAttempt>, i64)> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT * FROM test_attempts
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR test_id = $2)
            ORDER BY started_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(test_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM test_attempts
               WHERE user_id = $1 AND ($2::uuid IS NULL OR test_id = $2)"#,
        )
        .bind(user_id)
        .bind(test_id)
        .fetch_one(&self.pool)
        .await?;

        let attempts = rows
            .into_iter()
            .map(TestAttempt::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((attempts, total))
    }

    async fn list_in_progress(&self) -> Result<Vec<TestAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"SELECT * FROM test_attempts WHERE status = 'in_progress' ORDER BY started_at"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TestAttempt::try_from).collect()
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"SELECT * FROM user_answers WHERE attempt_id = $1 ORDER BY answered_at"#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Answer::try_from).collect()
    }

    async fn find_answer(&self, attempt_id: Uuid, question_id: Uuid) -> Result<Option<Answer>> {
        let row = sqlx::query_as::<_, AnswerRow>(
            r#"SELECT * FROM user_answers WHERE attempt_id = $1 AND question_id = $2"#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Answer::try_from).transpose()
    }

    async fn insert_answer_if_absent(&self, answer: &Answer) -> Result<InsertAnswerOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes with complete/abandon on the same attempt.
        let Some(attempt) = Self::lock_attempt(&mut tx, answer.attempt_id).await? else {
            return Ok(InsertAnswerOutcome::AttemptMissing);
        };
        if attempt.status != AttemptStatus::InProgress {
            return Ok(InsertAnswerOutcome::NotInProgress(attempt.status));
        }

        let (selected_options, text_answer) = payload_columns(&answer.answer);
        let row = sqlx::query_as::<_, AnswerRow>(
            r#"
            INSERT INTO user_answers (
                id, attempt_id, question_id, selected_options, text_answer,
                is_correct, points_earned, answered_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (attempt_id, question_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(answer.id)
        .bind(answer.attempt_id)
        .bind(answer.question_id)
        .bind(selected_options)
        .bind(text_answer)
        .bind(answer.is_correct)
        .bind(answer.points_earned)
        .bind(answer.answered_at)
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some(row) => {
                tx.commit().await?;
                Ok(InsertAnswerOutcome::Inserted(row.try_into()?))
            }
            None => Ok(InsertAnswerOutcome::Duplicate),
        }
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        max_score: i32,
        completed_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(attempt) = Self::lock_attempt(&mut tx, attempt_id).await? else {
            return Ok(TransitionOutcome::AttemptMissing);
        };
        if attempt.status.is_terminal() {
            return Ok(TransitionOutcome::AlreadyTerminal(attempt.status));
        }

        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            UPDATE test_attempts
            SET status = 'completed',
                score = (
                    SELECT COALESCE(SUM(points_earned), 0)::integer
                    FROM user_answers WHERE attempt_id = $1
                ),
                max_score = $2,
                completed_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(max_score)
        .bind(completed_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(TransitionOutcome::Transitioned(row.try_into()?))
    }

    async fn abandon_attempt(&self, attempt_id: Uuid, at: DateTime<Utc>) -> Result<TransitionOutcome> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            UPDATE test_attempts
            SET status = 'abandoned', completed_at = $2
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(TransitionOutcome::Transitioned(row.try_into()?));
        }

        match self.get_attempt(attempt_id).await? {
            Some(attempt) => Ok(TransitionOutcome::AlreadyTerminal(attempt.status)),
            None => Ok(TransitionOutcome::AttemptMissing),
        }
    }
}
