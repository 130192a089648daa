use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{Question, QuestionKind};
use crate::models::test::Test;
use crate::services::test_service::{TestDetails, TestList};
use crate::utils::pagination;

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
#[serde(default)]
pub struct TestListQuery {
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TestSearchQuery {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSummaryResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Test> for TestSummaryResponse {
    fn from(value: Test) -> Self {
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            duration_minutes: value.duration_minutes,
            is_active: value.is_active,
            created_at: value.created_at,
        }
    }
}

/// Question as shown to test takers. The answer key never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub text: String,
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub points: i32,
    pub order_index: i32,
}

impl From<Question> for QuestionResponse {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            text: value.text,
            kind: value.kind,
            options: value.options,
            points: value.points,
            order_index: value.order_index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDetailResponse {
    pub test: TestSummaryResponse,
    pub questions: Vec<QuestionResponse>,
}

impl From<TestDetails> for TestDetailResponse {
    fn from(value: TestDetails) -> Self {
        Self {
            test: value.test.into(),
            questions: value.questions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestListResponse {
    pub items: Vec<TestSummaryResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl From<TestList> for TestListResponse {
    fn from(value: TestList) -> Self {
        Self {
            items: value.items.into_iter().map(Into::into).collect(),
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: pagination::total_pages(value.total, value.per_page),
        }
    }
}
