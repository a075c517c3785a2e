use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::{Listing, Seller};
use crate::error::{ModeraError, Result};
use crate::service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub id: i64,
    pub is_verified_seller: bool,
}

/// `POST /users` — creates a seller. Not part of the moderation pipeline
/// itself; listings depend on a seller row existing.
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<Seller>> {
    if req.id < 0 {
        return Err(ModeraError::InvalidInput("`id` must be non-negative".to_string()));
    }
    let seller = state.store.create_user(req.id, req.is_verified_seller).await?;
    Ok(Json(seller))
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub seller_id: i64,
    pub item_id: i64,
    pub name: String,
    pub description: String,
    pub category: i32,
    pub images_qty: i32,
}

/// `POST /advertisements` — the HTTP edge of Listing creation.
pub async fn create_listing(
    State(state): State<AppState>,
    Json(req): Json<CreateListingRequest>,
) -> Result<Json<Listing>> {
    if req.item_id < 0 || req.seller_id < 0 || req.category < 0 || req.images_qty < 0 {
        return Err(ModeraError::InvalidInput(
            "`item_id`, `seller_id`, `category` and `images_qty` must be non-negative".to_string(),
        ));
    }
    if req.description.is_empty() {
        return Err(ModeraError::InvalidInput(
            "`description` must be non-empty".to_string(),
        ));
    }
    let listing = state
        .store
        .create_listing(
            req.seller_id,
            req.item_id,
            &req.name,
            &req.description,
            req.category,
            req.images_qty,
        )
        .await?;
    Ok(Json(listing))
}

#[derive(Debug, Serialize)]
pub struct CloseAdvertisementResponse {
    pub item_id: i64,
    pub status: &'static str,
    pub message: &'static str,
}

/// `DELETE /advertisements/{item_id}/close` — hard-deletes the listing and
/// its tasks, then invalidates the caches those rows populated.
pub async fn close_advertisement(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> Result<Json<CloseAdvertisementResponse>> {
    let outcome = service::close_listing(&state, item_id).await?;
    Ok(Json(CloseAdvertisementResponse {
        item_id: outcome.item_id,
        status: "closed",
        message: "Advertisement closed",
    }))
}
