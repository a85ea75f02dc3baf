use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::explain::pipeline::Explanation;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ExplainRequest {
    pub question: String,
}

#[derive(Deserialize)]
pub struct ExplainBulkRequest {
    pub questions: Vec<String>,
}

#[derive(Serialize)]
pub struct ExplainBulkResponse {
    pub explanations: Vec<Explanation>,
}

/// POST /api/v1/ai/explanations
pub async fn handle_explain(
    State(state): State<AppState>,
    Json(req): Json<ExplainRequest>,
) -> Result<Json<Explanation>, AppError> {
    let explanation = state.pipeline.explain_one(&req.question).await?;
    Ok(Json(explanation))
}

/// POST /api/v1/ai/explanations/bulk
pub async fn handle_explain_bulk(
    State(state): State<AppState>,
    Json(req): Json<ExplainBulkRequest>,
) -> Result<Json<ExplainBulkResponse>, AppError> {
    let explanations = state.pipeline.explain_bulk(&req.questions).await?;
    Ok(Json(ExplainBulkResponse { explanations }))
}
