//! Order service: reads, status changes, payment status and cancellation.

use common::{OrderId, OrderStatus};
use store::{OrderQuery, OrderRecord, Page, Store, UnitOfWork};

use crate::error::DomainError;
use crate::identity::{Caller, Role};
use crate::inventory::InventoryLedger;
use crate::retry::{DEFAULT_MAX_ATTEMPTS, run_with_retry};

use super::{CancelOrder, Order, UpdateOrderStatus, UpdatePaymentStatus};

/// Service for managing placed orders.
///
/// Each mutating operation runs in one unit of work and is retried as a whole
/// when the store reports a concurrency conflict.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
    max_attempts: u32,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an order with its lines and transactions. Owner or admin only.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, caller: Caller, id: OrderId) -> Result<Order, DomainError> {
        let mut uow = self.store.begin().await?;
        let order = load_order(&mut uow, id).await?;
        uow.rollback().await?;

        if !caller.can_access(order.user_id()) {
            return Err(DomainError::unauthorized("order belongs to another user"));
        }
        Ok(order)
    }

    /// Lists order headers. Customers only ever see their own orders.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(
        &self,
        caller: Caller,
        query: OrderQuery,
    ) -> Result<Page<OrderRecord>, DomainError> {
        let query = match caller.role {
            Role::Admin => query,
            Role::Customer => query.user_id(caller.user_id),
            Role::Gateway => {
                return Err(DomainError::unauthorized("gateway cannot list orders"));
            }
        };

        let mut uow = self.store.begin().await?;
        let page = uow.list_orders(&query).await?;
        uow.rollback().await?;
        Ok(page)
    }

    /// Moves an order to a new fulfilment status. Admin only.
    ///
    /// Moving to CANCELLED returns every line's quantity to stock in the same
    /// unit of work.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        caller: Caller,
        cmd: UpdateOrderStatus,
    ) -> Result<Order, DomainError> {
        if !caller.is_admin() {
            return Err(DomainError::unauthorized("only admins can change order status"));
        }

        run_with_retry("update_status", self.max_attempts, || {
            self.try_update_status(&cmd)
        })
        .await
    }

    async fn try_update_status(&self, cmd: &UpdateOrderStatus) -> Result<Order, DomainError> {
        let mut uow = self.store.begin().await?;
        let mut order = load_order(&mut uow, cmd.order_id).await?;
        let from = order.status();

        order.transition_to(cmd.status)?;
        if cmd.status == OrderStatus::Cancelled {
            InventoryLedger::credit_lines(&mut uow, order.details()).await?;
        }
        save(&mut uow, &mut order).await?;
        uow.commit().await?;

        record_transition(from, order.status());
        tracing::info!(order_id = %order.id(), %from, to = %order.status(), "order status updated");
        Ok(order)
    }

    /// Advances payment status along UNPAID -> PAID -> REFUNDED.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        caller: Caller,
        cmd: UpdatePaymentStatus,
    ) -> Result<Order, DomainError> {
        if !caller.can_manage_payments() {
            return Err(DomainError::unauthorized(
                "only admins can change payment status",
            ));
        }

        run_with_retry("update_payment_status", self.max_attempts, || {
            self.try_update_payment_status(&cmd)
        })
        .await
    }

    async fn try_update_payment_status(
        &self,
        cmd: &UpdatePaymentStatus,
    ) -> Result<Order, DomainError> {
        let mut uow = self.store.begin().await?;
        let mut order = load_order(&mut uow, cmd.order_id).await?;
        let from = order.payment_status();

        order.set_payment_status(cmd.payment_status)?;
        save(&mut uow, &mut order).await?;
        uow.commit().await?;

        tracing::info!(
            order_id = %order.id(),
            %from,
            to = %order.payment_status(),
            "payment status updated"
        );
        Ok(order)
    }

    /// Cancels a PENDING or CONFIRMED order and restores its stock.
    ///
    /// Owner or admin only. A second cancel fails with `NotCancellable` and
    /// credits nothing.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, caller: Caller, cmd: CancelOrder) -> Result<Order, DomainError> {
        cmd.validate()?;
        run_with_retry("cancel", self.max_attempts, || self.try_cancel(caller, &cmd)).await
    }

    async fn try_cancel(&self, caller: Caller, cmd: &CancelOrder) -> Result<Order, DomainError> {
        let mut uow = self.store.begin().await?;
        let mut order = load_order(&mut uow, cmd.order_id).await?;
        if !caller.can_access(order.user_id()) {
            return Err(DomainError::unauthorized("order belongs to another user"));
        }
        let from = order.status();

        order.cancel(cmd.reason.clone())?;
        let restored = InventoryLedger::credit_lines(&mut uow, order.details()).await?;
        save(&mut uow, &mut order).await?;
        uow.commit().await?;

        record_transition(from, order.status());
        tracing::info!(order_id = %order.id(), restored, "order cancelled");
        Ok(order)
    }
}

/// Loads an order aggregate inside `uow`, failing with `NotFound`.
pub(crate) async fn load_order<U: UnitOfWork>(
    uow: &mut U,
    id: OrderId,
) -> Result<Order, DomainError> {
    let header = uow
        .order(id)
        .await?
        .ok_or_else(|| DomainError::not_found("order", id))?;
    let details = uow.order_details(id).await?;
    let transactions = uow.transactions_for_order(id).await?;
    Ok(Order::from_records(header, details, transactions))
}

/// Writes the order header with a compare-and-swap on its version.
pub(crate) async fn save<U: UnitOfWork>(uow: &mut U, order: &mut Order) -> Result<(), DomainError> {
    let version = uow.update_order(order.header(), order.version()).await?;
    order.set_version(version);
    Ok(())
}

fn record_transition(from: OrderStatus, to: OrderStatus) {
    metrics::counter!(
        "order_status_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}
