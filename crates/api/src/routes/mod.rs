//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payment;

use axum::Json;
use serde::Serialize;

use crate::error::ApiError;

/// Success envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

pub(crate) fn parse_id<T: From<uuid::Uuid>>(kind: &str, id: &str) -> Result<T, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {kind} ID format: {e}")))?;
    Ok(T::from(uuid))
}
