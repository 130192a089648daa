use std::sync::Arc;

use uuid::Uuid;

use crate::database::CatalogStore;
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::models::test::Test;
use crate::utils::pagination;

/// Most results a title search returns.
pub const SEARCH_LIMIT: i64 = 20;

/// Read-only browsing of the test catalog.
#[derive(Clone)]
pub struct TestService {
    catalog: Arc<dyn CatalogStore>,
}

#[derive(Debug, Clone)]
pub struct TestList {
    pub items: Vec<Test>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone)]
pub struct TestDetails {
    pub test: Test,
    pub questions: Vec<Question>,
}

impl TestService {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    pub async fn list_tests(&self, page: i64, per_page: i64) -> Result<TestList> {
        let (items, total) = self
            .catalog
            .list_tests(per_page, pagination::page_offset(page, per_page))
            .await?;
        Ok(TestList {
            items,
            total,
            page,
            per_page,
        })
    }

    pub async fn search_tests(&self, title: &str) -> Result<Vec<Test>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(Vec::new());
        }
        self.catalog.search_tests(title, SEARCH_LIMIT).await
    }

    pub async fn get_test(&self, test_id: Uuid) -> Result<TestDetails> {
        let test = self
            .catalog
            .get_test(test_id)
            .await?
            .ok_or(Error::TestNotFound(test_id))?;
        let questions = self.catalog.list_questions(test_id).await?;
        Ok(TestDetails { test, questions })
    }
}
