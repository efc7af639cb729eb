//! Domain layer for the order core.
//!
//! This crate provides:
//! - Cart editing and the checkout orchestrator
//! - The order aggregate with its status and payment state machines
//! - The inventory ledger for stock debits and credits
//! - Idempotent payment gateway reconciliation

pub mod cart;
pub mod checkout;
pub mod error;
pub mod identity;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod pricing;
mod retry;

pub use cart::{Cart, CartLine, CartService};
pub use checkout::CheckoutService;
pub use error::{DomainError, ErrorKind};
pub use identity::{Caller, Role};
pub use inventory::InventoryLedger;
pub use order::{
    CancelOrder, Order, OrderError, OrderLine, OrderService, PlaceOrder, Transitions,
    UpdateOrderStatus, UpdatePaymentStatus,
};
pub use payment::{
    GatewayNotification, GatewayStatus, PaymentReconciler, ReconciliationOutcome, RejectReason,
};
pub use pricing::{Charges, FlatRatePricing, PricingPolicy};
pub use retry::DEFAULT_MAX_ATTEMPTS;
