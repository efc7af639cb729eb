use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A compare-and-swap write found a different version than expected.
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// A unique key already exists.
    #[error("Duplicate {entity}: {key}")]
    DuplicateKey { entity: &'static str, key: String },

    /// Cart lines read earlier in this unit of work were changed by another one.
    #[error("Cart of user {user_id} changed concurrently")]
    CartChanged { user_id: String },

    /// The row to update does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stock adjustment would leave a negative quantity.
    #[error("Stock underflow for product {product_id}: stock {stock}, delta {delta}")]
    StockUnderflow {
        product_id: String,
        stock: i64,
        delta: i64,
    },

    /// The database aborted the transaction (serialization failure or deadlock).
    #[error("Transaction aborted by the database: {0}")]
    TransactionAborted(String),

    /// A stored value could not be decoded into its domain type.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if re-running the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. }
                | StoreError::DuplicateKey { .. }
                | StoreError::CartChanged { .. }
                | StoreError::TransactionAborted(_)
        )
    }
}

impl From<common::ParseEnumError> for StoreError {
    fn from(e: common::ParseEnumError) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
