//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Coarse classification of every domain failure, used by the HTTP boundary
/// to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    Conflict,
    Server,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or out-of-range input.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// An order, product or cart line does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller may not perform this action.
    #[error("Not allowed: {0}")]
    Unauthorized(String),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        DomainError::Unauthorized(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation { .. } => ErrorKind::Validation,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Unauthorized(_) => ErrorKind::Authorization,
            DomainError::Order(e) => e.kind(),
            DomainError::Store(e) => match e {
                StoreError::ConcurrencyConflict { .. }
                | StoreError::DuplicateKey { .. }
                | StoreError::CartChanged { .. }
                | StoreError::StockUnderflow { .. }
                | StoreError::TransactionAborted(_) => ErrorKind::Conflict,
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                _ => ErrorKind::Server,
            },
        }
    }

    /// Returns true if re-running the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Store(e) if e.is_retryable())
    }
}
