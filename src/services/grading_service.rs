use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::models::answer::AnswerPayload;
use crate::models::question::{AnswerKey, Question, QuestionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub is_correct: bool,
    pub points_earned: i32,
}

impl Grade {
    fn for_question(question: &Question, is_correct: bool) -> Self {
        Self {
            is_correct,
            points_earned: if is_correct { question.points } else { 0 },
        }
    }
}

pub struct GradingService;

impl GradingService {
    /// Grades one submitted answer against the question's key. All-or-nothing:
    /// no partial credit for choice questions.
    pub fn grade(question: &Question, payload: &AnswerPayload) -> Result<Grade> {
        match &question.kind {
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice => {
                let AnswerKey::Choices(correct) = &question.correct_answer else {
                    return Err(Error::InvalidAnswerKey {
                        question_id: question.id,
                    });
                };
                let AnswerPayload::SelectedOptions(selected) = payload else {
                    return Err(Self::mismatch(question, payload));
                };
                let selected: BTreeSet<u32> = selected.iter().copied().collect();
                Ok(Grade::for_question(question, &selected == correct))
            }
            QuestionKind::OpenEnded => {
                let AnswerKey::Text(correct) = &question.correct_answer else {
                    return Err(Error::InvalidAnswerKey {
                        question_id: question.id,
                    });
                };
                let AnswerPayload::TextAnswer(submitted) = payload else {
                    return Err(Self::mismatch(question, payload));
                };
                Ok(Grade::for_question(
                    question,
                    normalize_text(submitted) == normalize_text(correct),
                ))
            }
            QuestionKind::Other(raw) => Err(Error::UnsupportedQuestionType {
                question_id: question.id,
                kind: raw.clone(),
            }),
        }
    }

    fn mismatch(question: &Question, payload: &AnswerPayload) -> Error {
        Error::TypeMismatch {
            question_id: question.id,
            expected: question.kind.clone(),
            submitted: payload.shape(),
        }
    }
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}
