//! Cart endpoints for the calling user.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::ProductId;
use domain::Cart;
use serde::{Deserialize, Serialize};
use store::Store;

use super::{Envelope, ok, parse_id};
use crate::error::ApiError;
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct ClearCartResponse {
    pub removed: u64,
}

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Json<Envelope<Cart>>, ApiError> {
    Ok(ok(state.carts.get_cart(caller.user_id).await?))
}

/// POST /cart/items: add a product, merging with an existing line.
#[tracing::instrument(skip(state, payload))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<Envelope<Cart>>, ApiError> {
    let Json(req) = payload?;
    let cart = state
        .carts
        .add_item(caller.user_id, req.product_id, req.quantity)
        .await?;
    Ok(ok(cart))
}

/// PUT /cart/items/{productId}: set a line's quantity; zero removes it.
#[tracing::instrument(skip(state, payload))]
pub async fn update_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(product_id): Path<String>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<Envelope<Cart>>, ApiError> {
    let product_id: ProductId = parse_id("product", &product_id)?;
    let Json(req) = payload?;
    let cart = state
        .carts
        .update_item(caller.user_id, product_id, req.quantity)
        .await?;
    Ok(ok(cart))
}

/// DELETE /cart/items/{productId}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(product_id): Path<String>,
) -> Result<Json<Envelope<Cart>>, ApiError> {
    let product_id: ProductId = parse_id("product", &product_id)?;
    let cart = state.carts.remove_item(caller.user_id, product_id).await?;
    Ok(ok(cart))
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Json<Envelope<ClearCartResponse>>, ApiError> {
    let removed = state.carts.clear(caller.user_id).await?;
    Ok(ok(ClearCartResponse { removed }))
}
