pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::curation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/duplicates/groups",
            get(handlers::handle_list_groups),
        )
        .route("/api/v1/duplicates/resolve", post(handlers::handle_resolve))
        .route(
            "/api/v1/duplicates/resolutions",
            get(handlers::handle_list_resolutions),
        )
        .route(
            "/api/v1/duplicates/resolutions/:group_key",
            get(handlers::handle_get_resolution),
        )
        .route(
            "/api/v1/lessons/:lesson_id/score",
            get(handlers::handle_lesson_score),
        )
        .route(
            "/api/v1/sessions/:session_id",
            delete(handlers::handle_end_session),
        )
        .with_state(state)
}
