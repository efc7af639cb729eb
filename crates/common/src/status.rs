//! Closed enumerations shared by the wire format and the database.
//!
//! The string forms are case-sensitive and identical in JSON bodies, query
//! strings and table columns.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string did not name a variant of the expected enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the wire/database string for this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Fulfilment status of an order.
///
/// ```text
/// PENDING ──► CONFIRMED ──► SHIPPING ──► COMPLETED
///    │            │
///    └────────────┴──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "SHIPPING")]
    Shipping,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

wire_enum!(OrderStatus, "order status", {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    Shipping => "SHIPPING",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "UNPAID")]
    Unpaid,
    #[serde(rename = "PAID")]
    Paid,
    #[serde(rename = "REFUNDED")]
    Refunded,
}

wire_enum!(PaymentStatus, "payment status", {
    Unpaid => "UNPAID",
    Paid => "PAID",
    Refunded => "REFUNDED",
});

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    #[serde(rename = "COD")]
    Cod,
    /// Online payment through the external gateway.
    #[serde(rename = "gateway")]
    Gateway,
}

wire_enum!(PaymentMethod, "payment method", {
    Cod => "COD",
    Gateway => "gateway",
});

/// Outcome recorded on a payment transaction row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[default]
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

wire_enum!(TransactionStatus, "transaction status", {
    Pending => "PENDING",
    Success => "SUCCESS",
    Failed => "FAILED",
});
