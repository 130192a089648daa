use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the user submitted. Choice questions take option indices, open-ended
/// questions take free text; the two never mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPayload {
    SelectedOptions(Vec<u32>),
    TextAnswer(String),
}

impl AnswerPayload {
    pub fn shape(&self) -> &'static str {
        match self {
            AnswerPayload::SelectedOptions(_) => "selected_options",
            AnswerPayload::TextAnswer(_) => "text_answer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub answer: AnswerPayload,
    pub is_correct: bool,
    pub points_earned: i32,
    pub answered_at: DateTime<Utc>,
}
