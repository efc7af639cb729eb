//! Order commands.

use common::{OrderId, OrderStatus, PaymentMethod, PaymentStatus};

use crate::error::DomainError;

const MAX_ADDRESS_LEN: usize = 500;
const MAX_NOTE_LEN: usize = 1000;
const MAX_REASON_LEN: usize = 1000;
const MIN_PHONE_DIGITS: usize = 8;
const MAX_PHONE_DIGITS: usize = 15;

/// Command to turn the caller's cart into an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub shipping_address: String,
    pub shipping_phone: String,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

impl PlaceOrder {
    pub fn new(
        shipping_address: impl Into<String>,
        shipping_phone: impl Into<String>,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            shipping_address: shipping_address.into(),
            shipping_phone: shipping_phone.into(),
            payment_method,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Checks the shipping details before any store access.
    pub fn validate(&self) -> Result<(), DomainError> {
        let address = self.shipping_address.trim();
        if address.is_empty() {
            return Err(DomainError::validation(
                "shippingAddress",
                "must not be empty",
            ));
        }
        if address.chars().count() > MAX_ADDRESS_LEN {
            return Err(DomainError::validation(
                "shippingAddress",
                format!("must be at most {MAX_ADDRESS_LEN} characters"),
            ));
        }

        validate_phone(&self.shipping_phone)?;

        if let Some(note) = &self.note
            && note.chars().count() > MAX_NOTE_LEN
        {
            return Err(DomainError::validation(
                "note",
                format!("must be at most {MAX_NOTE_LEN} characters"),
            ));
        }

        Ok(())
    }
}

/// Accepts 8 to 15 digits, an optional leading `+` and spaces, dashes, dots
/// or parentheses as separators.
fn validate_phone(phone: &str) -> Result<(), DomainError> {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);

    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => {
                return Err(DomainError::validation(
                    "shippingPhone",
                    "may only contain digits, a leading '+' and separators",
                ));
            }
        }
    }

    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        return Err(DomainError::validation(
            "shippingPhone",
            format!("must contain {MIN_PHONE_DIGITS} to {MAX_PHONE_DIGITS} digits"),
        ));
    }

    Ok(())
}

/// Command to move an order to a new fulfilment status. Admin only.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl UpdateOrderStatus {
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self { order_id, status }
    }
}

/// Command to move an order to a new payment status.
#[derive(Debug, Clone)]
pub struct UpdatePaymentStatus {
    pub order_id: OrderId,
    pub payment_status: PaymentStatus,
}

impl UpdatePaymentStatus {
    pub fn new(order_id: OrderId, payment_status: PaymentStatus) -> Self {
        Self {
            order_id,
            payment_status,
        }
    }
}

/// Command to cancel an order and return its stock.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: Option<String>,
}

impl CancelOrder {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            reason: None,
        }
    }

    pub fn with_reason(order_id: OrderId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: Some(reason.into()),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(reason) = &self.reason
            && reason.chars().count() > MAX_REASON_LEN
        {
            return Err(DomainError::validation(
                "reason",
                format!("must be at most {MAX_REASON_LEN} characters"),
            ));
        }
        Ok(())
    }
}
