//! Order and payment state machines.
//!
//! ```text
//! PENDING ──► CONFIRMED ──► SHIPPING ──► COMPLETED
//!    │            │
//!    └────────────┴──► CANCELLED
//!
//! UNPAID ──► PAID ──► REFUNDED
//! ```
//!
//! Every lifecycle check in the crate goes through these tables.

use common::{OrderStatus, PaymentStatus};

/// A closed status enumeration with a fixed successor table.
pub trait Transitions: Copy + PartialEq + Sized + 'static {
    /// Statuses directly reachable from `self`.
    fn successors(&self) -> &'static [Self];

    /// Returns true if moving from `self` to `next` is legal.
    fn can_transition_to(&self, next: Self) -> bool {
        self.successors().contains(&next)
    }

    /// Returns true if nothing can follow this status.
    fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl Transitions for OrderStatus {
    fn successors(&self) -> &'static [Self] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Shipping, OrderStatus::Cancelled],
            OrderStatus::Shipping => &[OrderStatus::Completed],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }
}

impl Transitions for PaymentStatus {
    fn successors(&self) -> &'static [Self] {
        match self {
            PaymentStatus::Unpaid => &[PaymentStatus::Paid],
            PaymentStatus::Paid => &[PaymentStatus::Refunded],
            PaymentStatus::Refunded => &[],
        }
    }
}

/// Returns true if an order in this status may still be cancelled.
pub(crate) fn is_cancellable(status: OrderStatus) -> bool {
    status.can_transition_to(OrderStatus::Cancelled)
}
