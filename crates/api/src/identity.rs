//! Caller identity and gateway key extraction from request headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::UserId;
use domain::Caller;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated caller, as asserted by the upstream auth layer.
///
/// `x-user-id` must be a UUID. `x-user-role` is `customer` (the default) or
/// `admin`.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Caller);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).map(Identity)
    }
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthenticated("Missing x-user-id header".to_string()))?;
    let user_id = UserId::parse_str(user_id)
        .map_err(|_| ApiError::Unauthenticated("Invalid x-user-id header".to_string()))?;

    match header(headers, USER_ROLE_HEADER) {
        None | Some("customer") => Ok(Caller::customer(user_id)),
        Some("admin") => Ok(Caller::admin(user_id)),
        Some(other) => Err(ApiError::Unauthenticated(format!("Unknown role: {other}"))),
    }
}

/// Returns true if the request carries the configured gateway key.
///
/// Always false when no key is configured.
pub fn has_gateway_key(headers: &HeaderMap, expected: Option<&str>) -> bool {
    match (header(headers, API_KEY_HEADER), expected) {
        (Some(given), Some(expected)) => constant_time_eq(given.as_bytes(), expected.as_bytes()),
        _ => false,
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Compares two byte strings in time independent of where they differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
