mod entities;
mod predict;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the axum router for the moderation pipeline's HTTP surface.
///
/// Entity management (users, advertisements) and synchronous scoring sit
/// alongside the asynchronous request/status routes so the workspace is
/// runnable end to end; the enqueue/status routes are the pipeline's core.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(entities::create_user))
        .route("/advertisements", post(entities::create_listing))
        .route(
            "/advertisements/{item_id}/close",
            delete(entities::close_advertisement),
        )
        .route("/moderation-requests", post(predict::enqueue))
        .route(
            "/moderation-requests/{task_id}",
            get(predict::get_task_status),
        )
        .route("/predict", post(predict::predict))
        .route("/simple_predict", get(predict::simple_predict))
        .with_state(state)
}
