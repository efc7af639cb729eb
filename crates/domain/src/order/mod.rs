//! Order aggregate, lifecycle rules and service.

mod aggregate;
mod commands;
mod service;
mod state;

pub use aggregate::{Order, OrderLine};
pub use commands::*;
pub use service::OrderService;
pub(crate) use service::{load_order, save};
pub use state::Transitions;

use common::{OrderStatus, PaymentStatus, ProductId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Business rule violations raised by checkout and the order lifecycle.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Product is missing, unpublished or deleted.
    #[error("Product {product_id} is not available")]
    ProductUnavailable { product_id: ProductId },

    /// Not enough stock to cover the requested quantity.
    #[error(
        "Insufficient stock for {product_name} ({product_id}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: i64,
    },

    /// Quantity must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A line subtotal or order total does not fit in a money amount.
    #[error("Order amount is too large")]
    AmountOverflow,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid payment status transition: {from} -> {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Only PENDING and CONFIRMED orders can be cancelled.
    #[error("Order cannot be cancelled in {status} status")]
    NotCancellable { status: OrderStatus },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::EmptyCart
            | OrderError::InvalidQuantity { .. }
            | OrderError::AmountOverflow => ErrorKind::Validation,
            _ => ErrorKind::Conflict,
        }
    }
}
