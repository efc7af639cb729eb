//! Shared types for the order backend.
//!
//! Everything here is plain data: identifiers, the `Money` amount type and the
//! closed status enumerations that appear both on the wire and in the database.

mod ids;
mod money;
mod status;

pub use ids::{OrderDetailId, OrderId, ProductId, TransactionId, UserId};
pub use money::Money;
pub use status::{OrderStatus, ParseEnumError, PaymentMethod, PaymentStatus, TransactionStatus};
