pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::explain;
use crate::interview;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Mock interview sessions
        .route(
            "/api/v1/interviews",
            post(interview::handlers::handle_start).get(interview::handlers::handle_list),
        )
        .route(
            "/api/v1/interviews/:id",
            get(interview::handlers::handle_get).delete(interview::handlers::handle_delete),
        )
        .route(
            "/api/v1/interviews/:id/chat",
            post(interview::handlers::handle_chat),
        )
        .route(
            "/api/v1/interviews/:id/end",
            post(interview::handlers::handle_end),
        )
        // AI explanations
        .route(
            "/api/v1/ai/explanations",
            post(explain::handlers::handle_explain),
        )
        .route(
            "/api/v1/ai/explanations/bulk",
            post(explain::handlers::handle_explain_bulk),
        )
        .with_state(state)
}
