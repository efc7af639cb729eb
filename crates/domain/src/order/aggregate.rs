//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{
    Money, OrderDetailId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
};
use store::{OrderDetailRecord, OrderRecord, TransactionRecord, Version};

use crate::pricing::Charges;

use super::{OrderError, PlaceOrder, state::Transitions};

/// A cart line priced at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
        }
    }

    pub fn subtotal(&self) -> Result<Money, OrderError> {
        self.unit_price
            .checked_multiply(self.quantity)
            .ok_or(OrderError::AmountOverflow)
    }

    /// Sum of the line subtotals.
    pub fn total_of(lines: &[OrderLine]) -> Result<Money, OrderError> {
        let subtotals = lines
            .iter()
            .map(OrderLine::subtotal)
            .collect::<Result<Vec<_>, _>>()?;
        Money::checked_sum(subtotals).ok_or(OrderError::AmountOverflow)
    }
}

/// Order aggregate root.
///
/// Wraps the header row with its frozen lines and payment audit trail. All
/// lifecycle changes go through methods on this type so the transition tables
/// are enforced in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    header: OrderRecord,
    details: Vec<OrderDetailRecord>,
    transactions: Vec<TransactionRecord>,
}

impl Order {
    /// Builds a new PENDING, UNPAID order from priced lines.
    pub fn place(
        user_id: Option<UserId>,
        cmd: &PlaceOrder,
        lines: &[OrderLine],
        charges: Charges,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if let Some(line) = lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: line.quantity,
            });
        }

        let id = OrderId::new();
        let subtotal = OrderLine::total_of(lines)?;
        let total = charges
            .total_for(subtotal)
            .ok_or(OrderError::AmountOverflow)?;
        let now = Utc::now();

        let details = lines
            .iter()
            .map(|line| {
                Ok(OrderDetailRecord {
                    id: OrderDetailId::new(),
                    order_id: id,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    subtotal: line.subtotal()?,
                })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        let header = OrderRecord {
            id,
            user_id,
            subtotal,
            shipping_fee: charges.shipping_fee,
            discount_amount: charges.effective_discount(subtotal),
            total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: cmd.payment_method,
            shipping_address: cmd.shipping_address.trim().to_string(),
            shipping_phone: cmd.shipping_phone.trim().to_string(),
            note: cmd
                .note
                .as_deref()
                .map(str::trim)
                .filter(|note| !note.is_empty())
                .map(str::to_string),
            cancel_reason: None,
            version: Version::first(),
            created_at: now,
            updated_at: now,
        };

        Ok(Self {
            header,
            details,
            transactions: Vec::new(),
        })
    }

    /// Rebuilds an order from stored rows.
    pub fn from_records(
        header: OrderRecord,
        details: Vec<OrderDetailRecord>,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        Self {
            header,
            details,
            transactions,
        }
    }

    /// Moves to `next` if the status table allows it.
    ///
    /// Cancelling through here does not touch stock; callers credit the
    /// lines in the same unit of work.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        let from = self.header.status;
        if !from.can_transition_to(next) {
            return Err(OrderError::InvalidStatusTransition { from, to: next });
        }
        self.header.status = next;
        self.header.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the order CANCELLED with an optional reason.
    pub fn cancel(&mut self, reason: Option<String>) -> Result<(), OrderError> {
        if !super::state::is_cancellable(self.header.status) {
            return Err(OrderError::NotCancellable {
                status: self.header.status,
            });
        }
        self.transition_to(OrderStatus::Cancelled)?;
        self.header.cancel_reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        Ok(())
    }

    pub fn set_payment_status(&mut self, next: PaymentStatus) -> Result<(), OrderError> {
        let from = self.header.payment_status;
        if !from.can_transition_to(next) {
            return Err(OrderError::InvalidPaymentTransition { from, to: next });
        }
        self.header.payment_status = next;
        self.header.updated_at = Utc::now();
        Ok(())
    }

    /// Records a stored version after a successful write.
    pub(crate) fn set_version(&mut self, version: Version) {
        self.header.version = version;
    }

    pub(crate) fn push_transaction(&mut self, transaction: TransactionRecord) {
        self.transactions.push(transaction);
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.header.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.header.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.header.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.header.payment_status
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.header.payment_method
    }

    pub fn subtotal(&self) -> Money {
        self.header.subtotal
    }

    pub fn shipping_fee(&self) -> Money {
        self.header.shipping_fee
    }

    pub fn discount_amount(&self) -> Money {
        self.header.discount_amount
    }

    pub fn total(&self) -> Money {
        self.header.total
    }

    pub fn shipping_address(&self) -> &str {
        &self.header.shipping_address
    }

    pub fn shipping_phone(&self) -> &str {
        &self.header.shipping_phone
    }

    pub fn note(&self) -> Option<&str> {
        self.header.note.as_deref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.header.cancel_reason.as_deref()
    }

    pub fn version(&self) -> Version {
        self.header.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.header.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.header.updated_at
    }

    /// The header row as persisted.
    pub fn header(&self) -> &OrderRecord {
        &self.header
    }

    pub fn details(&self) -> &[OrderDetailRecord] {
        &self.details
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    /// Returns the total quantity over all lines.
    pub fn total_quantity(&self) -> u32 {
        self.details.iter().map(|d| d.quantity).sum()
    }

    pub fn is_terminal(&self) -> bool {
        self.header.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn cmd() -> PlaceOrder {
        PlaceOrder::new("1 Main St", "0901234567", PaymentMethod::Cod)
    }

    fn lines() -> Vec<OrderLine> {
        vec![
            OrderLine::new(ProductId::new(), "A", Money::from_cents(100), 2),
            OrderLine::new(ProductId::new(), "B", Money::from_cents(50), 1),
        ]
    }

    fn placed() -> Order {
        Order::place(Some(UserId::new()), &cmd(), &lines(), Charges::default()).unwrap()
    }

    #[test]
    fn test_place_computes_totals() {
        let charges = Charges::new(Money::from_cents(30), Money::from_cents(10));
        let order = Order::place(None, &cmd(), &lines(), charges).unwrap();

        assert_eq!(order.subtotal(), Money::from_cents(250));
        assert_eq!(order.shipping_fee(), Money::from_cents(30));
        assert_eq!(order.discount_amount(), Money::from_cents(10));
        assert_eq!(order.total(), Money::from_cents(270));
        assert_eq!(
            order.total(),
            order.subtotal() + order.shipping_fee() - order.discount_amount()
        );
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Unpaid);
        assert_eq!(order.version(), Version::first());
    }

    #[test]
    fn test_place_freezes_lines() {
        let order = placed();
        assert_eq!(order.details().len(), 2);
        assert_eq!(order.details()[0].unit_price, Money::from_cents(100));
        assert_eq!(order.details()[0].subtotal, Money::from_cents(200));
        assert!(order.details().iter().all(|d| d.order_id == order.id()));
        assert_eq!(order.total_quantity(), 3);
    }

    #[test]
    fn test_place_empty_fails() {
        let result = Order::place(None, &cmd(), &[], Charges::default());
        assert!(matches!(result, Err(OrderError::EmptyCart)));
    }

    #[test]
    fn test_place_zero_quantity_fails() {
        let lines = vec![OrderLine::new(ProductId::new(), "A", Money::from_cents(1), 0)];
        let result = Order::place(None, &cmd(), &lines, Charges::default());
        assert!(matches!(
            result,
            Err(OrderError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[test]
    fn test_place_overflowing_amount_fails() {
        let price = Money::from_cents(i64::MAX / 2 + 1);
        let lines = vec![OrderLine::new(ProductId::new(), "A", price, 2)];
        let result = Order::place(None, &cmd(), &lines, Charges::default());

        let err = result.unwrap_err();
        assert!(matches!(err, OrderError::AmountOverflow));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let fee = Charges::new(Money::from_cents(1), Money::zero());
        let lines = vec![OrderLine::new(ProductId::new(), "A", Money::from_cents(i64::MAX), 1)];
        let result = Order::place(None, &cmd(), &lines, fee);
        assert!(matches!(result, Err(OrderError::AmountOverflow)));
    }

    #[test]
    fn test_blank_note_is_dropped() {
        let order = Order::place(None, &cmd().with_note("  "), &lines(), Charges::default())
            .unwrap();
        assert_eq!(order.note(), None);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut order = placed();
        order.transition_to(OrderStatus::Confirmed).unwrap();
        order.transition_to(OrderStatus::Shipping).unwrap();
        order.transition_to(OrderStatus::Completed).unwrap();
        assert!(order.is_terminal());
    }

    #[test]
    fn test_illegal_transition_leaves_order_unchanged() {
        let mut order = placed();
        let before = order.clone();
        let err = order.transition_to(OrderStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Completed
            }
        ));
        assert_eq!(order, before);
    }

    #[test]
    fn test_cancel_records_reason() {
        let mut order = placed();
        order.cancel(Some(" changed my mind ".to_string())).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.cancel_reason(), Some("changed my mind"));
    }

    #[test]
    fn test_cancel_twice_fails() {
        let mut order = placed();
        order.cancel(None).unwrap();
        let err = order.cancel(None).unwrap_err();
        assert!(matches!(
            err,
            OrderError::NotCancellable {
                status: OrderStatus::Cancelled
            }
        ));
    }

    #[test]
    fn test_cannot_cancel_shipping_order() {
        let mut order = placed();
        order.transition_to(OrderStatus::Confirmed).unwrap();
        order.transition_to(OrderStatus::Shipping).unwrap();
        assert!(matches!(
            order.cancel(None),
            Err(OrderError::NotCancellable { .. })
        ));
    }

    #[test]
    fn test_payment_status_is_strict() {
        let mut order = placed();
        assert!(order.set_payment_status(PaymentStatus::Refunded).is_err());
        order.set_payment_status(PaymentStatus::Paid).unwrap();
        assert!(order.set_payment_status(PaymentStatus::Paid).is_err());
        order.set_payment_status(PaymentStatus::Refunded).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
    }
}
