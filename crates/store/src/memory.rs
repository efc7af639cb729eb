use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, TransactionId, UserId};
use tokio::sync::RwLock;

use crate::{
    CartItemRecord, OrderDetailRecord, OrderQuery, OrderRecord, OrderSortField, Page,
    ProductRecord, Result, SortDirection, StoreError, TransactionRecord, Version,
    store::{Store, UnitOfWork},
};

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<ProductId, ProductRecord>,
    carts: HashMap<UserId, Vec<CartItemRecord>>,
    orders: HashMap<OrderId, OrderRecord>,
    details: HashMap<OrderId, Vec<OrderDetailRecord>>,
    /// Keyed by transaction code, which is unique.
    transactions: HashMap<String, TransactionRecord>,
}

/// In-memory store for tests and local runs.
///
/// Units of work read from a private snapshot and are validated against the
/// shared state at commit: every product and order they wrote must still be
/// at the version they started from, every cart they wrote must still hold
/// the lines they started from, and every code or id they inserted must
/// still be free. This gives the same conflict behavior callers see from the
/// PostgreSQL store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of committed payment transactions.
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    /// Clears all state.
    pub async fn clear(&self) {
        *self.state.write().await = State::default();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        let snapshot = self.state.read().await.clone();
        Ok(InMemoryUnitOfWork {
            shared: self.state.clone(),
            work: snapshot,
            product_bases: HashMap::new(),
            order_bases: HashMap::new(),
            cart_bases: HashMap::new(),
            transaction_writes: HashMap::new(),
        })
    }

    async fn close(&self) {}
}

/// A unit of work over an [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    shared: Arc<RwLock<State>>,
    work: State,
    /// Version each written product had when this unit of work first wrote it.
    product_bases: HashMap<ProductId, Version>,
    /// `None` marks an order inserted by this unit of work.
    order_bases: HashMap<OrderId, Option<Version>>,
    /// Lines each written cart held when this unit of work first wrote it,
    /// sorted by product.
    cart_bases: HashMap<UserId, Vec<CartItemRecord>>,
    /// `None` marks an inserted code, `Some` an update of an existing row.
    transaction_writes: HashMap<String, Option<TransactionId>>,
}

fn cart_lines(cart: Option<&Vec<CartItemRecord>>) -> Vec<CartItemRecord> {
    let mut lines = cart.cloned().unwrap_or_default();
    lines.sort_by_key(|i| i.product_id);
    lines
}

impl InMemoryUnitOfWork {
    fn touch_cart(&mut self, user_id: UserId) {
        if !self.cart_bases.contains_key(&user_id) {
            let base = cart_lines(self.work.carts.get(&user_id));
            self.cart_bases.insert(user_id, base);
        }
    }

    fn validate(&self, live: &State) -> Result<()> {
        for (id, base) in &self.product_bases {
            let actual = live
                .products
                .get(id)
                .map(|p| p.version)
                .unwrap_or(Version::initial());
            if actual != *base {
                return Err(StoreError::ConcurrencyConflict {
                    entity: "product",
                    id: id.to_string(),
                    expected: *base,
                    actual,
                });
            }
        }

        for (id, base) in &self.order_bases {
            match (base, live.orders.get(id)) {
                (None, Some(_)) => {
                    return Err(StoreError::DuplicateKey {
                        entity: "order",
                        key: id.to_string(),
                    });
                }
                (Some(expected), existing) => {
                    let actual = existing.map(|o| o.version).unwrap_or(Version::initial());
                    if actual != *expected {
                        return Err(StoreError::ConcurrencyConflict {
                            entity: "order",
                            id: id.to_string(),
                            expected: *expected,
                            actual,
                        });
                    }
                }
                (None, None) => {}
            }
        }

        for (user_id, base) in &self.cart_bases {
            if cart_lines(live.carts.get(user_id)) != *base {
                return Err(StoreError::CartChanged {
                    user_id: user_id.to_string(),
                });
            }
        }

        for (code, write) in &self.transaction_writes {
            let existing = live.transactions.get(code).map(|t| t.id);
            let ok = match write {
                None => existing.is_none(),
                Some(id) => existing == Some(*id),
            };
            if !ok {
                return Err(StoreError::DuplicateKey {
                    entity: "transaction",
                    key: code.clone(),
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.work.products.get(&id).cloned())
    }

    async fn products_for_update(&mut self, ids: &[ProductId]) -> Result<Vec<ProductRecord>> {
        let mut products: Vec<_> = ids
            .iter()
            .filter_map(|id| self.work.products.get(id).cloned())
            .collect();
        products.sort_by_key(|p| p.id);
        products.dedup_by_key(|p| p.id);
        Ok(products)
    }

    async fn upsert_product(&mut self, product: &ProductRecord) -> Result<Version> {
        let current = self
            .work
            .products
            .get(&product.id)
            .map(|p| p.version)
            .unwrap_or(Version::initial());
        self.product_bases.entry(product.id).or_insert(current);

        let mut stored = product.clone();
        stored.version = current.next();
        stored.updated_at = Utc::now();
        let version = stored.version;
        self.work.products.insert(product.id, stored);
        Ok(version)
    }

    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta: i64,
        expected: Version,
    ) -> Result<ProductRecord> {
        let product = self
            .work
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "product",
                id: id.to_string(),
            })?;

        if product.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: "product",
                id: id.to_string(),
                expected,
                actual: product.version,
            });
        }

        let stock = product.stock + delta;
        if stock < 0 {
            return Err(StoreError::StockUnderflow {
                product_id: id.to_string(),
                stock: product.stock,
                delta,
            });
        }

        self.product_bases.entry(id).or_insert(expected);
        product.stock = stock;
        product.version = expected.next();
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItemRecord>> {
        let mut items = self.work.carts.get(&user_id).cloned().unwrap_or_default();
        items.sort_by_key(|i| i.added_at);
        Ok(items)
    }

    async fn put_cart_item(&mut self, item: &CartItemRecord) -> Result<()> {
        self.touch_cart(item.user_id);
        let cart = self.work.carts.entry(item.user_id).or_default();
        match cart.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => *existing = item.clone(),
            None => cart.push(item.clone()),
        }
        Ok(())
    }

    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let present = self
            .work
            .carts
            .get(&user_id)
            .is_some_and(|cart| cart.iter().any(|i| i.product_id == product_id));
        if !present {
            return Ok(false);
        }
        self.touch_cart(user_id);
        if let Some(cart) = self.work.carts.get_mut(&user_id) {
            cart.retain(|i| i.product_id != product_id);
        }
        Ok(true)
    }

    async fn remove_cart_lines(&mut self, user_id: UserId, lines: &[CartItemRecord]) -> Result<()> {
        let cart = self.work.carts.get(&user_id);
        let all_present = lines.iter().all(|line| {
            cart.is_some_and(|c| {
                c.iter()
                    .any(|i| i.product_id == line.product_id && i.quantity == line.quantity)
            })
        });
        if !all_present {
            return Err(StoreError::CartChanged {
                user_id: user_id.to_string(),
            });
        }

        self.touch_cart(user_id);
        if let Some(cart) = self.work.carts.get_mut(&user_id) {
            cart.retain(|i| !lines.iter().any(|line| line.product_id == i.product_id));
        }
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64> {
        self.touch_cart(user_id);
        let removed = self
            .work
            .carts
            .remove(&user_id)
            .map(|c| c.len())
            .unwrap_or(0);
        Ok(removed as u64)
    }

    async fn insert_order(
        &mut self,
        order: &OrderRecord,
        details: &[OrderDetailRecord],
    ) -> Result<()> {
        if self.work.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateKey {
                entity: "order",
                key: order.id.to_string(),
            });
        }
        self.order_bases.insert(order.id, None);
        self.work.orders.insert(order.id, order.clone());
        self.work.details.insert(order.id, details.to_vec());
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn order_details(&mut self, id: OrderId) -> Result<Vec<OrderDetailRecord>> {
        Ok(self.work.details.get(&id).cloned().unwrap_or_default())
    }

    async fn update_order(&mut self, order: &OrderRecord, expected: Version) -> Result<Version> {
        let current = self
            .work
            .orders
            .get(&order.id)
            .map(|o| o.version)
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: order.id.to_string(),
            })?;

        if current != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: "order",
                id: order.id.to_string(),
                expected,
                actual: current,
            });
        }

        self.order_bases.entry(order.id).or_insert(Some(expected));
        let mut stored = order.clone();
        stored.version = expected.next();
        stored.updated_at = Utc::now();
        let version = stored.version;
        self.work.orders.insert(order.id, stored);
        Ok(version)
    }

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Page<OrderRecord>> {
        let mut orders: Vec<_> = self
            .work
            .orders
            .values()
            .filter(|o| {
                if let Some(user_id) = query.user_id
                    && o.user_id != Some(user_id)
                {
                    return false;
                }
                if let Some(status) = query.status
                    && o.status != status
                {
                    return false;
                }
                if let Some(payment_status) = query.payment_status
                    && o.payment_status != payment_status
                {
                    return false;
                }
                if let Some(from) = query.from
                    && o.created_at < from
                {
                    return false;
                }
                if let Some(to) = query.to
                    && o.created_at > to
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        orders.sort_by(|a, b| {
            let ordering = match query.sort_by {
                OrderSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                OrderSortField::TotalMoney => a.total.cmp(&b.total),
                OrderSortField::Status => a.status.as_str().cmp(b.status.as_str()),
            }
            .then(a.id.cmp(&b.id));
            match query.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total = orders.len() as u64;
        let items = orders
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();

        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn transactions_for_order(&mut self, id: OrderId) -> Result<Vec<TransactionRecord>> {
        let mut transactions: Vec<_> = self
            .work
            .transactions
            .values()
            .filter(|t| t.order_id == Some(id))
            .cloned()
            .collect();
        transactions.sort_by_key(|t| t.created_at);
        Ok(transactions)
    }

    async fn transaction_by_code(&mut self, code: &str) -> Result<Option<TransactionRecord>> {
        Ok(self.work.transactions.get(code).cloned())
    }

    async fn insert_transaction(&mut self, transaction: &TransactionRecord) -> Result<()> {
        let code = &transaction.transaction_code;
        if self.work.transactions.contains_key(code) {
            return Err(StoreError::DuplicateKey {
                entity: "transaction",
                key: code.clone(),
            });
        }
        self.transaction_writes.insert(code.clone(), None);
        self.work
            .transactions
            .insert(code.clone(), transaction.clone());
        Ok(())
    }

    async fn update_transaction(&mut self, transaction: &TransactionRecord) -> Result<()> {
        let code = &transaction.transaction_code;
        match self.work.transactions.get(code) {
            Some(existing) if existing.id == transaction.id => {}
            _ => {
                return Err(StoreError::NotFound {
                    entity: "transaction",
                    id: transaction.id.to_string(),
                });
            }
        }
        self.transaction_writes
            .entry(code.clone())
            .or_insert(Some(transaction.id));
        self.work
            .transactions
            .insert(code.clone(), transaction.clone());
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let mut live = self.shared.write().await;
        if let Err(e) = self.validate(&live) {
            tracing::debug!(error = %e, "in-memory unit of work rejected at commit");
            return Err(e);
        }

        let mut work = self.work;
        for id in self.product_bases.keys() {
            if let Some(product) = work.products.remove(id) {
                live.products.insert(*id, product);
            }
        }
        for id in self.order_bases.keys() {
            if let Some(order) = work.orders.remove(id) {
                live.orders.insert(*id, order);
            }
            if let Some(details) = work.details.remove(id) {
                live.details.insert(*id, details);
            }
        }
        for user_id in self.cart_bases.keys() {
            match work.carts.remove(user_id) {
                Some(cart) if !cart.is_empty() => {
                    live.carts.insert(*user_id, cart);
                }
                _ => {
                    live.carts.remove(user_id);
                }
            }
        }
        for code in self.transaction_writes.keys() {
            if let Some(transaction) = work.transactions.remove(code) {
                live.transactions.insert(code.clone(), transaction);
            }
        }

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{
        Money, OrderDetailId, OrderStatus, PaymentMethod, PaymentStatus, TransactionStatus,
    };

    use super::*;

    async fn seed_product(store: &InMemoryStore, stock: i64) -> ProductRecord {
        let product = ProductRecord::new(ProductId::new(), "Widget", Money::from_cents(100), stock);
        let mut uow = store.begin().await.unwrap();
        uow.upsert_product(&product).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.product(product.id).await.unwrap().unwrap()
    }

    fn order_record(user_id: UserId) -> OrderRecord {
        let now = Utc::now();
        OrderRecord {
            id: OrderId::new(),
            user_id: Some(user_id),
            subtotal: Money::from_cents(100),
            shipping_fee: Money::zero(),
            discount_amount: Money::zero(),
            total: Money::from_cents(100),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: PaymentMethod::Cod,
            shipping_address: "1 Main St".to_string(),
            shipping_phone: "0123456789".to_string(),
            note: None,
            cancel_reason: None,
            version: Version::first(),
            created_at: now,
            updated_at: now,
        }
    }

    fn transaction(code: &str) -> TransactionRecord {
        TransactionRecord {
            id: TransactionId::new(),
            order_id: None,
            method: PaymentMethod::Gateway,
            transaction_code: code.to_string(),
            amount: Money::from_cents(100),
            status: TransactionStatus::Failed,
            description: "unmatched".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_assigns_first_version() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 5).await;
        assert_eq!(product.version, Version::first());
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 5).await;

        let mut uow = store.begin().await.unwrap();
        uow.adjust_stock(product.id, -2, product.version)
            .await
            .unwrap();
        drop(uow);

        let mut uow = store.begin().await.unwrap();
        let reread = uow.product(product.id).await.unwrap().unwrap();
        assert_eq!(reread.stock, 5);
        assert_eq!(reread.version, product.version);
    }

    #[tokio::test]
    async fn adjust_stock_rejects_stale_version() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 5).await;

        let mut uow = store.begin().await.unwrap();
        let result = uow
            .adjust_stock(product.id, -1, product.version.next())
            .await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn adjust_stock_rejects_underflow() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 1).await;

        let mut uow = store.begin().await.unwrap();
        let result = uow.adjust_stock(product.id, -2, product.version).await;
        assert!(matches!(result, Err(StoreError::StockUnderflow { .. })));
    }

    #[tokio::test]
    async fn concurrent_units_conflict_at_commit() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 5).await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        first
            .adjust_stock(product.id, -5, product.version)
            .await
            .unwrap();
        second
            .adjust_stock(product.id, -5, product.version)
            .await
            .unwrap();

        first.commit().await.unwrap();
        let result = second.commit().await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { entity: "product", .. })
        ));

        let mut uow = store.begin().await.unwrap();
        let reread = uow.product(product.id).await.unwrap().unwrap();
        assert_eq!(reread.stock, 0);
        assert_eq!(reread.version, product.version.next());
    }

    #[tokio::test]
    async fn order_update_is_compare_and_swap() {
        let store = InMemoryStore::new();
        let order = order_record(UserId::new());

        let mut uow = store.begin().await.unwrap();
        uow.insert_order(&order, &[]).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let mut updated = order.clone();
        updated.status = OrderStatus::Confirmed;
        let version = uow.update_order(&updated, Version::first()).await.unwrap();
        assert_eq!(version, Version::new(2));

        let stale = uow.update_order(&updated, Version::first()).await;
        assert!(matches!(
            stale,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let reread = uow.order(order.id).await.unwrap().unwrap();
        assert_eq!(reread.status, OrderStatus::Confirmed);
        assert_eq!(reread.version, Version::new(2));
    }

    #[tokio::test]
    async fn order_details_are_stored_with_header() {
        let store = InMemoryStore::new();
        let order = order_record(UserId::new());
        let detail = OrderDetailRecord {
            id: OrderDetailId::new(),
            order_id: order.id,
            product_id: ProductId::new(),
            product_name: "Widget".to_string(),
            unit_price: Money::from_cents(100),
            quantity: 1,
            subtotal: Money::from_cents(100),
        };

        let mut uow = store.begin().await.unwrap();
        uow.insert_order(&order, std::slice::from_ref(&detail))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.order_details(order.id).await.unwrap(), vec![detail]);
    }

    #[tokio::test]
    async fn duplicate_transaction_codes_conflict_across_units() {
        let store = InMemoryStore::new();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_transaction(&transaction("TX-1")).await.unwrap();
        second.insert_transaction(&transaction("TX-1")).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(
            second.commit().await,
            Err(StoreError::DuplicateKey { .. })
        ));
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn cart_lines_are_unique_per_product() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let product_id = ProductId::new();

        let mut uow = store.begin().await.unwrap();
        for quantity in [1, 3] {
            uow.put_cart_item(&CartItemRecord {
                user_id,
                product_id,
                quantity,
                added_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let items = uow.cart_items(user_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);

        assert_eq!(uow.clear_cart(user_id).await.unwrap(), 1);
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert!(uow.cart_items(user_id).await.unwrap().is_empty());
    }

    fn cart_item(user_id: UserId, product_id: ProductId, quantity: u32) -> CartItemRecord {
        CartItemRecord {
            user_id,
            product_id,
            quantity,
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn stale_cart_write_conflicts_at_commit() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let ordered = cart_item(user_id, ProductId::new(), 2);

        let mut uow = store.begin().await.unwrap();
        uow.put_cart_item(&ordered).await.unwrap();
        uow.commit().await.unwrap();

        // An edit starts from the cart that still holds the ordered line.
        let mut edit = store.begin().await.unwrap();

        let mut checkout = store.begin().await.unwrap();
        let read = checkout.cart_items(user_id).await.unwrap();
        checkout.remove_cart_lines(user_id, &read).await.unwrap();
        checkout.commit().await.unwrap();

        edit.put_cart_item(&cart_item(user_id, ProductId::new(), 1))
            .await
            .unwrap();
        assert!(matches!(
            edit.commit().await,
            Err(StoreError::CartChanged { .. })
        ));

        let mut uow = store.begin().await.unwrap();
        assert!(uow.cart_items(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_cart_lines_requires_lines_as_read() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let kept = cart_item(user_id, ProductId::new(), 1);
        let ordered = cart_item(user_id, ProductId::new(), 2);

        let mut uow = store.begin().await.unwrap();
        uow.put_cart_item(&kept).await.unwrap();
        uow.put_cart_item(&ordered).await.unwrap();

        let changed = CartItemRecord {
            quantity: 3,
            ..ordered.clone()
        };
        assert!(matches!(
            uow.remove_cart_lines(user_id, std::slice::from_ref(&changed))
                .await,
            Err(StoreError::CartChanged { .. })
        ));

        uow.remove_cart_lines(user_id, std::slice::from_ref(&ordered))
            .await
            .unwrap();
        assert_eq!(uow.cart_items(user_id).await.unwrap(), vec![kept]);
    }

    #[tokio::test]
    async fn list_orders_filters_and_pages() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();

        let mut uow = store.begin().await.unwrap();
        for cents in [100, 300, 200] {
            let mut order = order_record(user_id);
            order.total = Money::from_cents(cents);
            uow.insert_order(&order, &[]).await.unwrap();
        }
        uow.insert_order(&order_record(UserId::new()), &[])
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let query = OrderQuery::for_user(user_id)
            .sort(OrderSortField::TotalMoney, SortDirection::Asc)
            .paginate(1, 2);
        let page = uow.list_orders(&query).await.unwrap();

        assert_eq!(page.total, 3);
        let totals: Vec<_> = page.items.iter().map(|o| o.total.cents()).collect();
        assert_eq!(totals, vec![100, 200]);
    }
}
