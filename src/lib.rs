pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::database::{AttemptStore, CatalogStore, PgAttemptStore, PgCatalogStore};
use crate::services::attempt_service::AttemptService;
use crate::services::test_service::TestService;

#[derive(Clone)]
pub struct AppState {
    pub attempt_service: AttemptService,
    pub test_service: TestService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        attempts: Arc<dyn AttemptStore>,
        jwt_secret: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            test_service: TestService::new(catalog.clone()),
            attempt_service: AttemptService::new(catalog, attempts),
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn from_pool(pool: PgPool, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self::new(
            Arc::new(PgCatalogStore::new(pool.clone())),
            Arc::new(PgAttemptStore::new(pool)),
            jwt_secret,
        )
    }
}
