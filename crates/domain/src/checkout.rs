//! Checkout: turns a cart into an order in one unit of work.

use std::{collections::HashMap, sync::Arc, time::Instant};

use common::ProductId;
use store::{ProductRecord, Store, UnitOfWork};

use crate::error::DomainError;
use crate::identity::{Caller, Role};
use crate::inventory::InventoryLedger;
use crate::order::{Order, OrderError, OrderLine, PlaceOrder};
use crate::pricing::{FlatRatePricing, PricingPolicy};
use crate::retry::{DEFAULT_MAX_ATTEMPTS, run_with_retry};

/// Service that places orders from carts.
///
/// A checkout either commits the order, the stock debits and the emptied cart
/// together, or changes nothing.
pub struct CheckoutService<S: Store, P: PricingPolicy = FlatRatePricing> {
    store: S,
    pricing: Arc<P>,
    max_attempts: u32,
}

impl<S: Store, P: PricingPolicy> Clone for CheckoutService<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            pricing: Arc::clone(&self.pricing),
            max_attempts: self.max_attempts,
        }
    }
}

impl<S: Store, P: PricingPolicy> CheckoutService<S, P> {
    pub fn new(store: S, pricing: P) -> Self {
        Self {
            store,
            pricing: Arc::new(pricing),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets how many times a conflicting checkout is re-run before giving up.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn pricing(&self) -> &P {
        &self.pricing
    }

    /// Places an order from the caller's cart.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %caller.user_id))]
    pub async fn checkout(&self, caller: Caller, cmd: PlaceOrder) -> Result<Order, DomainError> {
        if caller.role == Role::Gateway {
            return Err(DomainError::unauthorized("gateway cannot place orders"));
        }
        cmd.validate()?;

        let start = Instant::now();
        metrics::counter!("checkout_total").increment(1);

        let result = run_with_retry("checkout", self.max_attempts, || {
            self.try_checkout(caller, &cmd)
        })
        .await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                tracing::info!(
                    order_id = %order.id(),
                    total = %order.total(),
                    lines = order.details().len(),
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "reason" => failure_reason(e))
                    .increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }

        result
    }

    async fn try_checkout(&self, caller: Caller, cmd: &PlaceOrder) -> Result<Order, DomainError> {
        let user_id = caller.user_id;
        let mut uow = self.store.begin().await?;

        let items = uow.cart_items(user_id).await?;
        if items.is_empty() {
            return Err(OrderError::EmptyCart.into());
        }

        let ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();
        let mut products: HashMap<ProductId, ProductRecord> = uow
            .products_for_update(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let product = match products.get(&item.product_id) {
                Some(product) if product.is_purchasable() => product,
                _ => {
                    return Err(OrderError::ProductUnavailable {
                        product_id: item.product_id,
                    }
                    .into());
                }
            };
            if i64::from(item.quantity) > product.stock {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    requested: item.quantity,
                    available: product.stock,
                }
                .into());
            }
            lines.push(OrderLine::new(
                product.id,
                product.name.clone(),
                product.price,
                item.quantity,
            ));
        }

        let subtotal = OrderLine::total_of(&lines)?;
        let charges = self.pricing.charges(Some(user_id), subtotal);
        let order = Order::place(Some(user_id), cmd, &lines, charges)?;

        uow.insert_order(order.header(), order.details()).await?;

        for line in &lines {
            let Some(product) = products.get(&line.product_id) else {
                continue;
            };
            let updated = InventoryLedger::debit(&mut uow, product, line.quantity).await?;
            products.insert(updated.id, updated);
        }

        uow.remove_cart_lines(user_id, &items).await?;
        uow.commit().await?;
        Ok(order)
    }
}

fn failure_reason(error: &DomainError) -> &'static str {
    match error {
        DomainError::Order(OrderError::EmptyCart) => "empty_cart",
        DomainError::Order(OrderError::ProductUnavailable { .. }) => "product_unavailable",
        DomainError::Order(OrderError::InsufficientStock { .. }) => "insufficient_stock",
        DomainError::Validation { .. } => "validation",
        e if e.is_retryable() => "conflict",
        _ => "error",
    }
}
