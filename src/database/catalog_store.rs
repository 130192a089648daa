use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::question::{AnswerKey, Question, QuestionKind};
use crate::models::test::Test;

/// Read access to test and question definitions. The engine never writes here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_test(&self, test_id: Uuid) -> Result<Option<Test>>;

    async fn get_question(&self, question_id: Uuid) -> Result<Option<Question>>;

    /// Questions of a test in presentation order.
    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<Question>>;

    /// Tests newest first, with the total count before paging.
    async fn list_tests(&self, limit: i64, offset: i64) -> Result<(Vec<Test>, i64)>;

    /// Tests whose title contains `title`, ignoring case, newest first.
    async fn search_tests(&self, title: &str, limit: i64) -> Result<Vec<Test>>;
}

fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    test_id: Uuid,
    question_text: String,
    question_type: String,
    options: Option<Json<Vec<String>>>,
    correct_answers: Json<AnswerKey>,
    points: i32,
    order_index: i32,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            test_id: row.test_id,
            text: row.question_text,
            kind: QuestionKind::from(row.question_type),
            options: row.options.map(|Json(options)| options).unwrap_or_default(),
            correct_answer: row.correct_answers.0,
            points: row.points,
            order_index: row.order_index,
        }
    }
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_test(&self, test_id: Uuid) -> Result<Option<Test>> {
        let test = sqlx::query_as::<_, Test>(
            r#"SELECT id, title, description, duration_minutes, is_active, created_at
               FROM tests WHERE id = $1"#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(test)
    }

    async fn get_question(&self, question_id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT id, test_id, question_text, question_type, options, correct_answers, points, order_index
               FROM questions WHERE id = $1"#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Question::from))
    }

    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT id, test_id, question_text, question_type, options, correct_answers, points, order_index
               FROM questions WHERE test_id = $1
               ORDER BY order_index, id"#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn list_tests(&self, limit: i64, offset: i64) -> Result<(Vec<Test>, i64)> {
        let tests = sqlx::query_as::<_, Test>(
            r#"SELECT id, title, description, duration_minutes, is_active, created_at
               FROM tests
               ORDER BY created_at DESC
               LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM tests"#)
            .fetch_one(&self.pool)
            .await?;
        Ok((tests, total))
    }

    async fn search_tests(&self, title: &str, limit: i64) -> Result<Vec<Test>> {
        let tests = sqlx::query_as::<_, Test>(
            r#"SELECT id, title, description, duration_minutes, is_active, created_at
               FROM tests
               WHERE title ILIKE $1
               ORDER BY created_at DESC
               LIMIT $2"#,
        )
        .bind(like_pattern(title))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(tests)
    }
}
