use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};

use crate::{
    CartItemRecord, OrderDetailRecord, OrderQuery, OrderRecord, Page, ProductRecord, Result,
    TransactionRecord, Version,
};

/// Entry point to persistent state.
///
/// A store hands out units of work. All reads and writes happen inside one;
/// nothing is visible to other units of work until [`UnitOfWork::commit`].
#[async_trait]
pub trait Store: Send + Sync + Clone + 'static {
    /// The unit-of-work type produced by this store.
    type Tx: UnitOfWork;

    /// Begins a new unit of work.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Releases underlying resources (connection pools). Called once at shutdown.
    async fn close(&self);
}

/// A single atomic unit of work.
///
/// Dropping a unit of work without calling [`commit`](UnitOfWork::commit)
/// discards every write made through it.
#[async_trait]
pub trait UnitOfWork: Send {
    // -- Products --

    /// Reads one product.
    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Reads several products for a subsequent stock write.
    ///
    /// Implementations return a consistent view and, where supported, lock the
    /// rows until the unit of work ends. Missing ids are omitted.
    async fn products_for_update(&mut self, ids: &[ProductId]) -> Result<Vec<ProductRecord>>;

    /// Inserts or replaces a product. Used by the catalog collaborator.
    async fn upsert_product(&mut self, product: &ProductRecord) -> Result<Version>;

    /// Adds `delta` (negative for a debit) to a product's stock.
    ///
    /// Fails with `ConcurrencyConflict` if the stored version is not
    /// `expected`, and with `StockUnderflow` if the result would be negative.
    /// Returns the updated row.
    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta: i64,
        expected: Version,
    ) -> Result<ProductRecord>;

    // -- Carts --

    /// Returns a user's cart lines, oldest first.
    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItemRecord>>;

    /// Inserts or replaces the line for `(item.user_id, item.product_id)`.
    async fn put_cart_item(&mut self, item: &CartItemRecord) -> Result<()>;

    /// Removes one line. Returns false if it did not exist.
    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    /// Removes exactly `lines`, as they were read earlier in this unit of work.
    ///
    /// Fails with `CartChanged` if any of them was since removed or given a
    /// different quantity. Lines not listed are left alone.
    async fn remove_cart_lines(&mut self, user_id: UserId, lines: &[CartItemRecord]) -> Result<()>;

    /// Removes every line of a user's cart, returning how many were removed.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64>;

    // -- Orders --

    /// Inserts an order header with its lines.
    async fn insert_order(
        &mut self,
        order: &OrderRecord,
        details: &[OrderDetailRecord],
    ) -> Result<()>;

    async fn order(&mut self, id: OrderId) -> Result<Option<OrderRecord>>;

    async fn order_details(&mut self, id: OrderId) -> Result<Vec<OrderDetailRecord>>;

    /// Writes an order header if its stored version equals `expected`.
    ///
    /// Returns the new version.
    async fn update_order(&mut self, order: &OrderRecord, expected: Version) -> Result<Version>;

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Page<OrderRecord>>;

    // -- Payment transactions --

    async fn transactions_for_order(&mut self, id: OrderId) -> Result<Vec<TransactionRecord>>;

    async fn transaction_by_code(&mut self, code: &str) -> Result<Option<TransactionRecord>>;

    /// Inserts a transaction. Fails with `DuplicateKey` if the code exists.
    async fn insert_transaction(&mut self, transaction: &TransactionRecord) -> Result<()>;

    /// Replaces an existing transaction row, matched by id.
    async fn update_transaction(&mut self, transaction: &TransactionRecord) -> Result<()>;

    // -- Lifecycle --

    /// Makes every write of this unit of work durable and visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this unit of work.
    async fn rollback(self) -> Result<()>;
}
