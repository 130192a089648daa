use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::answer::AnswerPayload;
use crate::models::question::{AnswerKey, Question, QuestionDefinition, QuestionKind};
use crate::models::test::TestDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DefinitionErrorKind {
    #[error("choice questions need at least one option")]
    MissingOptions,

    #[error("answer index {index} is out of range for {option_count} option(s)")]
    InvalidAnswerIndex { index: u32, option_count: usize },

    #[error("open-ended questions must not define options")]
    UnexpectedOptions,

    #[error("the correct answer is missing")]
    MissingAnswerKey,

    #[error("a {kind} question cannot use this kind of answer key")]
    AnswerKeyMismatch { kind: String },

    #[error("points must be positive, got {points}")]
    InvalidPoints { points: i32 },

    #[error("question type '{kind}' is not supported")]
    UnsupportedQuestionType { kind: String },

    #[error("a test needs at least one question")]
    NoQuestions,

    #[error("duration must be positive, got {duration_minutes} minute(s)")]
    InvalidDuration { duration_minutes: i32 },
}

/// One problem in a test definition. `question_index` is 1-based and absent for
/// test-level problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionError {
    pub question_index: Option<usize>,
    pub field: &'static str,
    #[serde(flatten)]
    pub kind: DefinitionErrorKind,
    pub message: String,
}

impl DefinitionError {
    pub fn new(question_index: Option<usize>, field: &'static str, kind: DefinitionErrorKind) -> Self {
        let message = match question_index {
            Some(idx) => format!("question {}: {}: {}", idx, field, kind),
            None => format!("{}: {}", field, kind),
        };
        Self {
            question_index,
            field,
            kind,
            message,
        }
    }
}

pub struct ValidationService;

impl ValidationService {
    /// Checks a single question. Errors carry no index; the caller attaches one.
    pub fn validate_question_definition(question: &QuestionDefinition) -> Vec<(&'static str, DefinitionErrorKind)> {
        let mut problems = Vec::new();

        if question.points <= 0 {
            problems.push((
                "points",
                DefinitionErrorKind::InvalidPoints {
                    points: question.points,
                },
            ));
        }

        match &question.kind {
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice => {
                if question.options.is_empty() {
                    problems.push(("options", DefinitionErrorKind::MissingOptions));
                }
                match &question.correct_answer {
                    AnswerKey::Choices(indices) if indices.is_empty() => {
                        problems.push(("correct_answer", DefinitionErrorKind::MissingAnswerKey));
                    }
                    AnswerKey::Choices(indices) => {
                        let option_count = question.options.len();
                        for &index in indices {
                            if index as usize >= option_count {
                                problems.push((
                                    "correct_answer",
                                    DefinitionErrorKind::InvalidAnswerIndex {
                                        index,
                                        option_count,
                                    },
                                ));
                            }
                        }
                    }
                    AnswerKey::Text(_) => problems.push((
                        "correct_answer",
                        DefinitionErrorKind::AnswerKeyMismatch {
                            kind: question.kind.to_string(),
                        },
                    )),
                }
            }
            QuestionKind::OpenEnded => {
                if !question.options.is_empty() {
                    problems.push(("options", DefinitionErrorKind::UnexpectedOptions));
                }
                match &question.correct_answer {
                    AnswerKey::Text(text) if text.trim().is_empty() => {
                        problems.push(("correct_answer", DefinitionErrorKind::MissingAnswerKey));
                    }
                    AnswerKey::Text(_) => {}
                    AnswerKey::Choices(_) => problems.push((
                        "correct_answer",
                        DefinitionErrorKind::AnswerKeyMismatch {
                            kind: question.kind.to_string(),
                        },
                    )),
                }
            }
            QuestionKind::Other(raw) => problems.push((
                "kind",
                DefinitionErrorKind::UnsupportedQuestionType { kind: raw.clone() },
            )),
        }

        problems
    }

    /// Collects every problem in the definition instead of stopping at the first.
    pub fn validate_test_definition(test: &TestDefinition) -> Vec<DefinitionError> {
        let mut errors = Vec::new();

        if test.questions.is_empty() {
            errors.push(DefinitionError::new(
                None,
                "questions",
                DefinitionErrorKind::NoQuestions,
            ));
        }

        if test.duration_minutes <= 0 {
            errors.push(DefinitionError::new(
                None,
                "duration_minutes",
                DefinitionErrorKind::InvalidDuration {
                    duration_minutes: test.duration_minutes,
                },
            ));
        }

        for (idx, question) in test.questions.iter().enumerate() {
            for (field, kind) in Self::validate_question_definition(question) {
                errors.push(DefinitionError::new(Some(idx + 1), field, kind));
            }
        }

        errors
    }

    pub fn ensure_valid_test(test: &TestDefinition) -> Result<()> {
        let errors = Self::validate_test_definition(test);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidDefinition(errors))
        }
    }

    pub fn validate_answer_submission(question: &Question, payload: &AnswerPayload) -> Result<()> {
        let matches = match (&question.kind, payload) {
            (QuestionKind::SingleChoice | QuestionKind::MultipleChoice, AnswerPayload::SelectedOptions(_)) => true,
            (QuestionKind::OpenEnded, AnswerPayload::TextAnswer(_)) => true,
            (QuestionKind::Other(raw), _) => {
                return Err(Error::UnsupportedQuestionType {
                    question_id: question.id,
                    kind: raw.clone(),
                })
            }
            _ => false,
        };

        if matches {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                question_id: question.id,
                expected: question.kind.clone(),
                submitted: payload.shape(),
            })
        }
    }
}
