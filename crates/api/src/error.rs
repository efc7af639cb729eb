//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed caller identity.
    #[error("{0}")]
    Unauthenticated(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => status_for(err.kind()),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
            // Persistence details stay in the logs.
            let body = serde_json::json!({ "success": false, "message": "Internal server error" });
            return (status, axum::Json(body)).into_response();
        }

        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use common::OrderStatus;
    use domain::OrderError;
    use store::StoreError;

    use super::*;

    #[test]
    fn test_domain_kinds_map_to_status_codes() {
        let cases = [
            (DomainError::validation("field", "bad"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("order", "x"), StatusCode::NOT_FOUND),
            (DomainError::unauthorized("no"), StatusCode::FORBIDDEN),
            (
                OrderError::InvalidStatusTransition {
                    from: OrderStatus::Completed,
                    to: OrderStatus::Pending,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                StoreError::InvalidData("x".to_string()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_missing_identity_is_unauthorized() {
        assert_eq!(
            ApiError::Unauthenticated("missing".to_string()).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
