//! Shared application state.

use std::sync::Arc;

use domain::{CartService, CheckoutService, OrderService, PaymentReconciler};
use store::Store;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub payments: PaymentReconciler<S>,
    /// Shared key expected in `x-api-key` from the payment gateway.
    pub webhook_key: Option<String>,
}

impl<S: Store> AppState<S> {
    /// Wires every service to `store` using the given configuration.
    pub fn new(store: S, config: &Config) -> Arc<Self> {
        let attempts = config.checkout_max_attempts;
        Arc::new(Self {
            carts: CartService::new(store.clone()),
            checkout: CheckoutService::new(store.clone(), config.pricing())
                .with_max_attempts(attempts),
            orders: OrderService::new(store.clone()).with_max_attempts(attempts),
            payments: PaymentReconciler::new(store.clone()).with_max_attempts(attempts),
            store,
            webhook_key: config.payment_webhook_key.clone(),
        })
    }
}
