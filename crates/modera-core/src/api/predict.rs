use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::Listing;
use crate::error::Result;
use crate::scorer::is_violation;
use crate::service::{self, EnqueueOutcome, PredictResult, TaskStatusView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub item_id: i64,
}

/// `POST /moderation-requests` — enqueues a moderation request.
pub async fn enqueue(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueOutcome>> {
    let outcome = service::enqueue(&state, req.item_id).await?;
    Ok(Json(outcome))
}

/// `GET /moderation-requests/{task_id}` — the HTTP edge of
/// [`service::get_task_status`].
pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<Json<TaskStatusView>> {
    let view = service::get_task_status(&state, task_id).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct SimplePredictQuery {
    pub item_id: i64,
}

/// `GET /simple_predict?item_id=` — the HTTP edge of
/// [`service::simple_predict`].
pub async fn simple_predict(
    State(state): State<AppState>,
    Query(query): Query<SimplePredictQuery>,
) -> Result<Json<PredictResult>> {
    let result = service::simple_predict(&state, query.item_id).await?;
    Ok(Json(result))
}

/// Inbound body for the direct-scoring endpoint: the caller supplies the
/// full listing, no database read.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub item_id: i64,
    pub seller_id: i64,
    pub is_verified_seller: bool,
    pub description: String,
    pub category: i32,
    pub images_qty: i32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DirectPredictResponse {
    pub is_valid: bool,
    pub probability: f64,
}

/// `POST /predict` — scores a caller-supplied listing directly, without
/// touching the store or either cache.
pub async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<DirectPredictResponse>> {
    let listing = Listing {
        item_id: req.item_id,
        seller_id: req.seller_id,
        name: String::new(),
        description: req.description,
        category: req.category,
        images_qty: req.images_qty,
        is_verified_seller: req.is_verified_seller,
    };
    let probability = state.scorer.score(listing.feature_vector()).await?;
    Ok(Json(DirectPredictResponse {
        is_valid: is_violation(probability),
        probability,
    }))
}
