use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::models::InterviewSession;
use crate::interview::service;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OwnerIdQuery {
    pub owner_id: Uuid,
}

#[derive(Deserialize)]
pub struct StartInterviewRequest {
    pub owner_id: Uuid,
    pub role: String,
    pub experience_years: i32,
    pub topics: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub owner_id: Uuid,
    pub answer: String,
}

#[derive(Deserialize)]
pub struct EndRequest {
    pub owner_id: Uuid,
}

/// POST /api/v1/interviews
pub async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartInterviewRequest>,
) -> Result<(StatusCode, Json<InterviewSession>), AppError> {
    let session = service::start_interview(
        state.store.as_ref(),
        state.provider.as_ref(),
        state.cache.as_ref(),
        req.owner_id,
        &req.role,
        req.experience_years,
        &req.topics,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/v1/interviews/:id/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<InterviewSession>, AppError> {
    let session = service::chat(
        state.store.as_ref(),
        state.provider.as_ref(),
        id,
        req.owner_id,
        &req.answer,
    )
    .await?;
    Ok(Json(session))
}

/// POST /api/v1/interviews/:id/end
pub async fn handle_end(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EndRequest>,
) -> Result<Json<InterviewSession>, AppError> {
    let session = service::end_interview(
        state.store.as_ref(),
        state.provider.as_ref(),
        state.cache.as_ref(),
        id,
        req.owner_id,
    )
    .await?;
    Ok(Json(session))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<OwnerIdQuery>,
) -> Result<Json<InterviewSession>, AppError> {
    let session = service::get_interview(state.store.as_ref(), id, params.owner_id).await?;
    Ok(Json(session))
}

/// GET /api/v1/interviews
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<OwnerIdQuery>,
) -> Result<Json<Vec<InterviewSession>>, AppError> {
    let sessions = service::list_interviews(
        state.store.as_ref(),
        state.cache.as_ref(),
        params.owner_id,
    )
    .await?;
    Ok(Json(sessions))
}

/// DELETE /api/v1/interviews/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<OwnerIdQuery>,
) -> Result<StatusCode, AppError> {
    service::delete_interview(
        state.store.as_ref(),
        state.cache.as_ref(),
        id,
        params.owner_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
