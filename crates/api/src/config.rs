//! Application configuration loaded from environment variables.

use std::str::FromStr;

use common::Money;
use domain::{DEFAULT_MAX_ATTEMPTS, FlatRatePricing};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string. Unset runs on the in-memory store.
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `PAYMENT_WEBHOOK_KEY`: shared key the gateway sends as `x-api-key`.
///   Unset disables the webhook.
/// - `SHIPPING_FEE_CENTS`: flat shipping fee (default: `3000`)
/// - `FREE_SHIPPING_THRESHOLD_CENTS`: subtotal at which shipping is free
///   (default: `50000`, `0` disables free shipping)
/// - `CHECKOUT_MAX_ATTEMPTS`: attempts per unit of work on conflicts (default: `3`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub payment_webhook_key: Option<String>,
    pub shipping_fee_cents: i64,
    pub free_shipping_threshold_cents: i64,
    pub checkout_max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(var("PORT")).unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            database_max_connections: parse(var("DATABASE_MAX_CONNECTIONS"))
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            payment_webhook_key: var("PAYMENT_WEBHOOK_KEY"),
            shipping_fee_cents: parse(var("SHIPPING_FEE_CENTS"))
                .filter(|n: &i64| *n >= 0)
                .unwrap_or(defaults.shipping_fee_cents),
            free_shipping_threshold_cents: parse(var("FREE_SHIPPING_THRESHOLD_CENTS"))
                .unwrap_or(defaults.free_shipping_threshold_cents),
            checkout_max_attempts: parse(var("CHECKOUT_MAX_ATTEMPTS"))
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.checkout_max_attempts),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checkout pricing built from the shipping settings.
    pub fn pricing(&self) -> FlatRatePricing {
        let threshold = (self.free_shipping_threshold_cents > 0)
            .then(|| Money::from_cents(self.free_shipping_threshold_cents));
        FlatRatePricing::new(Money::from_cents(self.shipping_fee_cents), threshold)
    }
}

fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            payment_webhook_key: None,
            shipping_fee_cents: 3_000,
            free_shipping_threshold_cents: 50_000,
            checkout_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}
