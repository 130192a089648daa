use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: AnswerKey,
    #[serde(default = "default_points")]
    pub points: i32,
    #[serde(default)]
    pub order_index: i32,
}

/// A question as submitted by catalog management, before it has ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDefinition {
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: AnswerKey,
    #[serde(default = "default_points")]
    pub points: i32,
}

fn default_points() -> i32 {
    1
}

impl Question {
    pub fn from_definition(test_id: Uuid, order_index: i32, def: QuestionDefinition) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_id,
            text: def.text,
            kind: def.kind,
            options: def.options,
            correct_answer: def.correct_answer,
            points: def.points,
            order_index,
        }
    }
}

/// Question kind as stored in the catalog. Kinds this engine does not know how
/// to grade are kept verbatim in `Other` so they can be rejected explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionKind {
    SingleChoice,
    MultipleChoice,
    OpenEnded,
    Other(String),
}

impl QuestionKind {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::OpenEnded => "open_ended",
            QuestionKind::Other(raw) => raw,
        }
    }
}

impl From<String> for QuestionKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "single_choice" => QuestionKind::SingleChoice,
            "multiple_choice" => QuestionKind::MultipleChoice,
            "open_ended" => QuestionKind::OpenEnded,
            _ => QuestionKind::Other(raw),
        }
    }
}

impl From<QuestionKind> for String {
    fn from(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative key: option indices for choice questions, reference text for
/// open-ended ones. Stored as a JSON array or a JSON string respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerKey {
    Choices(BTreeSet<u32>),
    Text(String),
}
