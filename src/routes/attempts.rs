use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::dto::attempt_dto::{
    AnswerResponse, AttemptDetailResponse, AttemptListResponse, AttemptResponse,
    ListAttemptsQuery, SubmitAnswerRequest,
};
use crate::middleware::auth::Claims;
use crate::utils::validation::validate;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListAttemptsQuery>,
) -> crate::error::Result<Response> {
    validate(&query)?;
    let user_id = claims.user_id()?;
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(20);

    let (attempts, total) = state
        .attempt_service
        .list_attempts(user_id, query.test_id, page, per_page)
        .await?;
    Ok(Json(AttemptListResponse::new(attempts, total, page, per_page)).into_response())
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let details = state
        .attempt_service
        .get_attempt(attempt_id, claims.user_id()?)
        .await?;
    Ok(Json(AttemptDetailResponse::from(details)).into_response())
}

#[axum::debug_handler]
pub async fn cancel_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let attempt = state
        .attempt_service
        .cancel_attempt(attempt_id, claims.user_id()?)
        .await?;
    Ok(Json(AttemptResponse::from(attempt)).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> crate::error::Result<Response> {
    let answer = state
        .attempt_service
        .submit_answer(attempt_id, req.question_id, req.answer, claims.user_id()?)
        .await?;
    Ok((StatusCode::CREATED, Json(AnswerResponse::from(answer))).into_response())
}

#[axum::debug_handler]
pub async fn finish_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let result = state
        .attempt_service
        .finish_attempt(attempt_id, claims.user_id()?)
        .await?;
    Ok(Json(result).into_response())
}
