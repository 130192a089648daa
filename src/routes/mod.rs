pub mod attempts;
pub mod health;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::auth::require_bearer_auth;
use crate::middleware::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::AppState;

/// Full HTTP surface. Everything under `/api` requires a bearer token.
pub fn build_router(state: AppState, limiter: RateLimiter) -> Router {
    let api = Router::new()
        .route("/tests", get(tests::list_tests))
        .route("/tests/search", get(tests::search_tests))
        .route("/tests/validate", post(tests::validate_definition))
        .route("/tests/:test_id", get(tests::get_test))
        .route("/tests/:test_id/start", post(tests::start_attempt))
        .route("/attempts", get(attempts::list_attempts))
        .route(
            "/attempts/:attempt_id",
            get(attempts::get_attempt).delete(attempts::cancel_attempt),
        )
        .route("/attempts/:attempt_id/answers", post(attempts::submit_answer))
        .route("/attempts/:attempt_id/finish", post(attempts::finish_attempt))
        .layer(from_fn_with_state(state.clone(), require_bearer_auth));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .layer(from_fn_with_state(limiter, rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
