use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;

use crate::models::question::QuestionKind;
use crate::models::test_attempt::AttemptStatus;
use crate::services::validation_service::DefinitionError;

pub type Result<T> = std::result::Result<T, Error>;

/// How a failure is surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Authorization,
    Unauthorized,
    Integrity,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Test {0} not found")]
    TestNotFound(Uuid),

    #[error("Test {0} is not active")]
    TestInactive(Uuid),

    #[error("Attempt {0} not found")]
    AttemptNotFound(Uuid),

    #[error("Question {question_id} does not belong to test {test_id}")]
    QuestionNotInTest { question_id: Uuid, test_id: Uuid },

    #[error("Attempt {attempt_id} belongs to another user")]
    NotOwner { attempt_id: Uuid },

    #[error("Attempt {attempt_id} is {status} and accepts no more answers")]
    AttemptFinalized {
        attempt_id: Uuid,
        status: AttemptStatus,
    },

    #[error("Attempt {attempt_id} is already {status}")]
    AlreadyFinalized {
        attempt_id: Uuid,
        status: AttemptStatus,
    },

    #[error("Question {question_id} was already answered in attempt {attempt_id}")]
    DuplicateAnswer { attempt_id: Uuid, question_id: Uuid },

    #[error("Answer shape '{submitted}' does not match {expected} question {question_id}")]
    TypeMismatch {
        question_id: Uuid,
        expected: QuestionKind,
        submitted: &'static str,
    },

    #[error("Test definition is invalid ({} problem(s))", .0.len())]
    InvalidDefinition(Vec<DefinitionError>),

    #[error("Question {question_id} has unsupported type '{kind}'")]
    UnsupportedQuestionType { question_id: Uuid, kind: String },

    #[error("Question {question_id} has an answer key that does not fit its type")]
    InvalidAnswerKey { question_id: Uuid },

    #[error("Data integrity error: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TestNotFound(_) | Error::AttemptNotFound(_) | Error::QuestionNotInTest { .. } => {
                ErrorKind::NotFound
            }
            Error::TestInactive(_)
            | Error::AttemptFinalized { .. }
            | Error::AlreadyFinalized { .. }
            | Error::DuplicateAnswer { .. } => ErrorKind::Conflict,
            Error::TypeMismatch { .. }
            | Error::InvalidDefinition(_)
            | Error::Validation(_) => ErrorKind::Validation,
            Error::NotOwner { .. } => ErrorKind::Authorization,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Config(_) => ErrorKind::Config,
            Error::UnsupportedQuestionType { .. }
            | Error::InvalidAnswerKey { .. }
            | Error::Integrity(_)
            | Error::Database(_) => ErrorKind::Integrity,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::TestNotFound(_) => "test_not_found",
            Error::TestInactive(_) => "test_inactive",
            Error::AttemptNotFound(_) => "attempt_not_found",
            Error::QuestionNotInTest { .. } => "question_not_in_test",
            Error::NotOwner { .. } => "not_owner",
            Error::AttemptFinalized { .. } => "attempt_finalized",
            Error::AlreadyFinalized { .. } => "already_finalized",
            Error::DuplicateAnswer { .. } => "duplicate_answer",
            Error::TypeMismatch { .. } => "type_mismatch",
            Error::InvalidDefinition(_) => "invalid_definition",
            Error::Validation(_) => "validation_error",
            _ => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Integrity | ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        let body = match &self {
            Error::InvalidDefinition(errors) => json!({
                "error": self.code(),
                "message": self.to_string(),
                "details": errors,
            }),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = ?self, "request failed with internal error");
                json!({
                    "error": self.code(),
                    "message": "An unexpected error occurred",
                })
            }
            _ => json!({
                "error": self.code(),
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.constraint().is_some() => Error::Integrity(format!(
                "constraint {} violated: {}",
                db.constraint().unwrap_or_default(),
                db.message()
            )),
            other => Error::Database(other),
        }
    }
}
