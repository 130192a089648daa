use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::{Answer, AnswerPayload};
use crate::models::test_attempt::{AttemptStatus, TestAttempt};
use crate::services::attempt_service::AttemptDetails;
use crate::services::validation_service::DefinitionError;
use crate::utils::pagination;

/// Blank text is accepted here and graded like any other answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    pub answer: AnswerPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
#[serde(default)]
pub struct ListAttemptsQuery {
    pub test_id: Option<Uuid>,
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub max_score: Option<i32>,
}

impl From<TestAttempt> for AttemptResponse {
    fn from(value: TestAttempt) -> Self {
        Self {
            id: value.id,
            test_id: value.test_id,
            user_id: value.user_id,
            status: value.status,
            started_at: value.started_at,
            completed_at: value.completed_at,
            score: value.score,
            max_score: value.max_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub answer: AnswerPayload,
    pub is_correct: bool,
    pub points_earned: i32,
    pub answered_at: DateTime<Utc>,
}

impl From<Answer> for AnswerResponse {
    fn from(value: Answer) -> Self {
        Self {
            id: value.id,
            attempt_id: value.attempt_id,
            question_id: value.question_id,
            answer: value.answer,
            is_correct: value.is_correct,
            points_earned: value.points_earned,
            answered_at: value.answered_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDetailResponse {
    pub attempt: AttemptResponse,
    pub answers: Vec<AnswerResponse>,
}

impl From<AttemptDetails> for AttemptDetailResponse {
    fn from(value: AttemptDetails) -> Self {
        Self {
            attempt: value.attempt.into(),
            answers: value.answers.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptListResponse {
    pub items: Vec<AttemptResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl AttemptListResponse {
    pub fn new(attempts: Vec<TestAttempt>, total: i64, page: i64, per_page: i64) -> Self {
        Self {
            items: attempts.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
            total_pages: pagination::total_pages(total, per_page),
        }
    }
}

/// Outcome of a dry-run definition check.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<DefinitionError>,
}

impl From<Vec<DefinitionError>> for ValidationReport {
    fn from(errors: Vec<DefinitionError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}
