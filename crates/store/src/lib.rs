//! Persistence for the order backend.
//!
//! A [`Store`] hands out [`UnitOfWork`] values; every multi-row change
//! (checkout, cancellation, payment reconciliation) runs inside one and
//! becomes visible atomically on commit. Stock and order rows carry a
//! [`Version`] that every write compares and bumps.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;
pub mod version;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use model::{CartItemRecord, OrderDetailRecord, OrderRecord, ProductRecord, TransactionRecord};
pub use postgres::{PgUnitOfWork, PostgresStore};
pub use query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, OrderQuery, OrderSortField, Page, SortDirection};
pub use store::{Store, UnitOfWork};
pub use version::Version;
