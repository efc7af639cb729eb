//! Shopping cart: a user's pending lines before checkout.

use chrono::Utc;
use common::{Money, ProductId, UserId};
use serde::Serialize;
use store::{CartItemRecord, ProductRecord, Store, UnitOfWork};

use crate::{
    error::DomainError,
    order::OrderError,
    retry::{DEFAULT_MAX_ATTEMPTS, run_with_retry},
};

/// One cart line joined with the current product data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    /// `None` if the product no longer exists.
    pub product_name: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
    /// False if the product is gone, hidden or short on stock.
    pub available: bool,
}

/// A user's cart as shown before checkout. Prices are current, not frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartLine>,
    pub total_quantity: u32,
    pub subtotal: Money,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Service for reading and editing carts.
///
/// Edits are retried as a whole when a concurrent writer changed the cart.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, DomainError> {
        let mut uow = self.store.begin().await?;
        let cart = load_cart(&mut uow, user_id).await?;
        uow.rollback().await?;
        Ok(cart)
    }

    /// Adds `quantity` units of a product, merging with an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity }.into());
        }

        run_with_retry("add_item", DEFAULT_MAX_ATTEMPTS, || {
            self.try_add_item(user_id, product_id, quantity)
        })
        .await
    }

    async fn try_add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let mut uow = self.store.begin().await?;
        let product = purchasable_product(&mut uow, product_id).await?;
        let existing = find_line(&mut uow, user_id, product_id).await?;

        let (merged, added_at) = match existing {
            Some(line) => (line.quantity.saturating_add(quantity), line.added_at),
            None => (quantity, Utc::now()),
        };
        ensure_stock(&product, merged)?;

        uow.put_cart_item(&CartItemRecord {
            user_id,
            product_id,
            quantity: merged,
            added_at,
        })
        .await?;
        let cart = load_cart(&mut uow, user_id).await?;
        uow.commit().await?;

        tracing::debug!(%product_id, quantity = merged, "cart line added");
        Ok(cart)
    }

    /// Sets a line's quantity. Zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        if quantity == 0 {
            return self.remove_item(user_id, product_id).await;
        }

        run_with_retry("update_item", DEFAULT_MAX_ATTEMPTS, || {
            self.try_update_item(user_id, product_id, quantity)
        })
        .await
    }

    async fn try_update_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let mut uow = self.store.begin().await?;
        let line = find_line(&mut uow, user_id, product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart item", product_id))?;
        let product = purchasable_product(&mut uow, product_id).await?;
        ensure_stock(&product, quantity)?;

        uow.put_cart_item(&CartItemRecord { quantity, ..line }).await?;
        let cart = load_cart(&mut uow, user_id).await?;
        uow.commit().await?;
        Ok(cart)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, DomainError> {
        run_with_retry("remove_item", DEFAULT_MAX_ATTEMPTS, || {
            self.try_remove_item(user_id, product_id)
        })
        .await
    }

    async fn try_remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, DomainError> {
        let mut uow = self.store.begin().await?;
        if !uow.remove_cart_item(user_id, product_id).await? {
            return Err(DomainError::not_found("cart item", product_id));
        }
        let cart = load_cart(&mut uow, user_id).await?;
        uow.commit().await?;
        Ok(cart)
    }

    /// Empties the cart, returning how many lines were removed.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<u64, DomainError> {
        run_with_retry("clear_cart", DEFAULT_MAX_ATTEMPTS, || self.try_clear(user_id)).await
    }

    async fn try_clear(&self, user_id: UserId) -> Result<u64, DomainError> {
        let mut uow = self.store.begin().await?;
        let removed = uow.clear_cart(user_id).await?;
        uow.commit().await?;
        Ok(removed)
    }
}

async fn find_line<U: UnitOfWork>(
    uow: &mut U,
    user_id: UserId,
    product_id: ProductId,
) -> Result<Option<CartItemRecord>, DomainError> {
    Ok(uow
        .cart_items(user_id)
        .await?
        .into_iter()
        .find(|item| item.product_id == product_id))
}

async fn purchasable_product<U: UnitOfWork>(
    uow: &mut U,
    product_id: ProductId,
) -> Result<ProductRecord, DomainError> {
    match uow.product(product_id).await? {
        Some(product) if product.is_purchasable() => Ok(product),
        Some(_) => Err(OrderError::ProductUnavailable { product_id }.into()),
        None => Err(DomainError::not_found("product", product_id)),
    }
}

fn ensure_stock(product: &ProductRecord, quantity: u32) -> Result<(), DomainError> {
    if i64::from(quantity) > product.stock {
        return Err(OrderError::InsufficientStock {
            product_id: product.id,
            product_name: product.name.clone(),
            requested: quantity,
            available: product.stock,
        }
        .into());
    }
    Ok(())
}

async fn load_cart<U: UnitOfWork>(uow: &mut U, user_id: UserId) -> Result<Cart, DomainError> {
    let items = uow.cart_items(user_id).await?;
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let line = match uow.product(item.product_id).await? {
            Some(product) => CartLine {
                product_id: item.product_id,
                available: product.is_purchasable() && i64::from(item.quantity) <= product.stock,
                product_name: Some(product.name),
                unit_price: product.price,
                quantity: item.quantity,
                subtotal: product
                    .price
                    .checked_multiply(item.quantity)
                    .ok_or(OrderError::AmountOverflow)?,
            },
            None => CartLine {
                product_id: item.product_id,
                product_name: None,
                unit_price: Money::zero(),
                quantity: item.quantity,
                subtotal: Money::zero(),
                available: false,
            },
        };
        lines.push(line);
    }

    Ok(Cart {
        user_id,
        total_quantity: lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity)),
        subtotal: Money::checked_sum(lines.iter().map(|l| l.subtotal))
            .ok_or(OrderError::AmountOverflow)?,
        items: lines,
    })
}
