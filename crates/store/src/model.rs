//! Row types persisted by the store.
//!
//! These mirror the tables one-to-one. Business rules live in the `domain`
//! crate; the store only enforces keys, versions and non-negative stock.

use chrono::{DateTime, Utc};
use common::{
    Money, OrderDetailId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    TransactionId, TransactionStatus, UserId,
};
use serde::{Deserialize, Serialize};

use crate::Version;

/// A catalog product as seen by the order core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub published: bool,
    pub deleted: bool,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Creates a published product at version 1.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, stock: i64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            stock,
            published: true,
            deleted: false,
            version: Version::first(),
            updated_at: Utc::now(),
        }
    }

    /// Returns true if the product can currently be bought.
    pub fn is_purchasable(&self) -> bool {
        self.published && !self.deleted
    }
}

/// One line of a user's cart. At most one per (user, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRecord {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

/// Order header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub discount_amount: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub shipping_phone: String,
    pub note: Option<String>,
    pub cancel_reason: Option<String>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetailRecord {
    pub id: OrderDetailId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

/// Payment audit row. `order_id` is empty when the notification could not be
/// correlated to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub order_id: Option<OrderId>,
    pub method: PaymentMethod,
    pub transaction_code: String,
    pub amount: Money,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
