//! Stock debits and credits.
//!
//! Every stock change goes through [`UnitOfWork::adjust_stock`] with the
//! version read earlier in the same unit of work, so a concurrent writer
//! surfaces as a conflict instead of a lost update.

use std::collections::HashMap;

use common::ProductId;
use store::{OrderDetailRecord, ProductRecord, StoreError, UnitOfWork};

use crate::{error::DomainError, order::OrderError};

/// Stateless ledger over the products table.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Removes `quantity` units from `product`, returning the updated row.
    pub async fn debit<U: UnitOfWork>(
        uow: &mut U,
        product: &ProductRecord,
        quantity: u32,
    ) -> Result<ProductRecord, DomainError> {
        let requested = i64::from(quantity);
        if product.stock < requested {
            return Err(insufficient(product, quantity, product.stock));
        }

        match uow
            .adjust_stock(product.id, -requested, product.version)
            .await
        {
            Ok(updated) => Ok(updated),
            Err(StoreError::StockUnderflow { stock, .. }) => {
                Err(insufficient(product, quantity, stock))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns `quantity` units to `product`, returning the updated row.
    pub async fn credit<U: UnitOfWork>(
        uow: &mut U,
        product: &ProductRecord,
        quantity: u32,
    ) -> Result<ProductRecord, DomainError> {
        Ok(uow
            .adjust_stock(product.id, i64::from(quantity), product.version)
            .await?)
    }

    /// Credits every order line back to its product.
    ///
    /// Lines whose product no longer exists are skipped with a warning.
    /// Returns the number of units restored.
    pub async fn credit_lines<U: UnitOfWork>(
        uow: &mut U,
        details: &[OrderDetailRecord],
    ) -> Result<u64, DomainError> {
        let ids: Vec<ProductId> = details.iter().map(|d| d.product_id).collect();
        let mut products: HashMap<ProductId, ProductRecord> = uow
            .products_for_update(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut restored = 0;
        for detail in details {
            let Some(product) = products.get(&detail.product_id) else {
                tracing::warn!(
                    product_id = %detail.product_id,
                    quantity = detail.quantity,
                    "product missing, stock not restored"
                );
                continue;
            };
            let updated = Self::credit(uow, product, detail.quantity).await?;
            products.insert(updated.id, updated);
            restored += u64::from(detail.quantity);
        }

        Ok(restored)
    }
}

fn insufficient(product: &ProductRecord, requested: u32, available: i64) -> DomainError {
    OrderError::InsufficientStock {
        product_id: product.id,
        product_name: product.name.clone(),
        requested,
        available,
    }
    .into()
}
