use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use sqlx::{
    PgPool, Postgres, QueryBuilder, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    CartItemRecord, OrderDetailRecord, OrderQuery, OrderRecord, OrderSortField, Page,
    ProductRecord, Result, SortDirection, StoreError, TransactionRecord, Version,
    store::{Store, UnitOfWork},
};

const PRODUCT_COLUMNS: &str =
    "id, name, price, stock, published, deleted, version, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, subtotal, shipping_fee, discount_amount, total, status, \
     payment_status, payment_method, shipping_address, shipping_phone, note, cancel_reason, \
     version, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, order_id, method, transaction_code, amount, status, description, created_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PgUnitOfWork {
            tx: self.pool.begin().await?,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A unit of work backed by a database transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.code().as_deref() {
            // serialization_failure, deadlock_detected
            Some("40001") | Some("40P01") => {
                tracing::debug!(error = %db_err, "transaction aborted by the database");
                return StoreError::TransactionAborted(db_err.message().to_string());
            }
            _ => {}
        }
    }
    StoreError::Database(e)
}

fn money(row: &PgRow, column: &str) -> Result<Money> {
    Ok(Money::from_cents(row.try_get::<i64, _>(column)?))
}

fn quantity(row: &PgRow, column: &str) -> Result<u32> {
    let raw: i32 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| StoreError::InvalidData(format!("negative {column}: {raw}")))
}

fn row_to_product(row: PgRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: money(&row, "price")?,
        stock: row.try_get("stock")?,
        published: row.try_get("published")?,
        deleted: row.try_get("deleted")?,
        version: Version::new(row.try_get("version")?),
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItemRecord> {
    Ok(CartItemRecord {
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: quantity(&row, "quantity")?,
        added_at: row.try_get("added_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<OrderRecord> {
    Ok(OrderRecord {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: row
            .try_get::<Option<Uuid>, _>("user_id")?
            .map(UserId::from_uuid),
        subtotal: money(&row, "subtotal")?,
        shipping_fee: money(&row, "shipping_fee")?,
        discount_amount: money(&row, "discount_amount")?,
        total: money(&row, "total")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        payment_status: row.try_get::<String, _>("payment_status")?.parse()?,
        payment_method: row.try_get::<String, _>("payment_method")?.parse()?,
        shipping_address: row.try_get("shipping_address")?,
        shipping_phone: row.try_get("shipping_phone")?,
        note: row.try_get("note")?,
        cancel_reason: row.try_get("cancel_reason")?,
        version: Version::new(row.try_get("version")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_detail(row: PgRow) -> Result<OrderDetailRecord> {
    Ok(OrderDetailRecord {
        id: row.try_get::<Uuid, _>("id")?.into(),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        unit_price: money(&row, "unit_price")?,
        quantity: quantity(&row, "quantity")?,
        subtotal: money(&row, "subtotal")?,
    })
}

fn row_to_transaction(row: PgRow) -> Result<TransactionRecord> {
    Ok(TransactionRecord {
        id: row.try_get::<Uuid, _>("id")?.into(),
        order_id: row
            .try_get::<Option<Uuid>, _>("order_id")?
            .map(OrderId::from_uuid),
        method: row.try_get::<String, _>("method")?.parse()?,
        transaction_code: row.try_get("transaction_code")?,
        amount: money(&row, "amount")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        description: row.try_get("description")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row.map(row_to_product).transpose()
    }

    async fn products_for_update(&mut self, ids: &[ProductId]) -> Result<Vec<ProductRecord>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();

        // Locking in id order keeps concurrent checkouts from deadlocking.
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&uuids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn upsert_product(&mut self, product: &ProductRecord) -> Result<Version> {
        let version: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (id, name, price, stock, published, deleted, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 1, now())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                published = EXCLUDED.published,
                deleted = EXCLUDED.deleted,
                version = products.version + 1,
                updated_at = now()
            RETURNING version
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock)
        .bind(product.published)
        .bind(product.deleted)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(Version::new(version))
    }

    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta: i64,
        expected: Version,
    ) -> Result<ProductRecord> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET stock = stock + $2, version = version + 1, updated_at = now()
            WHERE id = $1 AND version = $3 AND stock + $2 >= 0
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(delta)
        .bind(expected.as_i64())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if let Some(row) = row {
            return row_to_product(row);
        }

        // Nothing updated: work out which guard failed.
        let current = self.product(id).await?.ok_or_else(|| StoreError::NotFound {
            entity: "product",
            id: id.to_string(),
        })?;

        if current.version != expected {
            Err(StoreError::ConcurrencyConflict {
                entity: "product",
                id: id.to_string(),
                expected,
                actual: current.version,
            })
        } else {
            Err(StoreError::StockUnderflow {
                product_id: id.to_string(),
                stock: current.stock,
                delta,
            })
        }
    }

    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, product_id, quantity, added_at
            FROM cart_items
            WHERE user_id = $1
            ORDER BY added_at ASC, product_id ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(row_to_cart_item).collect()
    }

    async fn put_cart_item(&mut self, item: &CartItemRecord) -> Result<()> {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| StoreError::InvalidData(format!("quantity too large: {}", item.quantity)))?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(item.user_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(quantity)
        .bind(item.added_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_cart_lines(&mut self, user_id: UserId, lines: &[CartItemRecord]) -> Result<()> {
        for line in lines {
            let quantity = i32::try_from(line.quantity).map_err(|_| {
                StoreError::InvalidData(format!("quantity too large: {}", line.quantity))
            })?;
            let result = sqlx::query(
                "DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2 AND quantity = $3",
            )
            .bind(user_id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::CartChanged {
                    user_id: user_id.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    async fn insert_order(
        &mut self,
        order: &OrderRecord,
        details: &[OrderDetailRecord],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, subtotal, shipping_fee, discount_amount, total,
                                status, payment_status, payment_method, shipping_address,
                                shipping_phone, note, cancel_reason, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.map(|u| u.as_uuid()))
        .bind(order.subtotal.cents())
        .bind(order.shipping_fee.cents())
        .bind(order.discount_amount.cents())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(&order.shipping_address)
        .bind(&order.shipping_phone)
        .bind(&order.note)
        .bind(&order.cancel_reason)
        .bind(order.version.as_i64())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        for detail in details {
            let quantity = i32::try_from(detail.quantity).map_err(|_| {
                StoreError::InvalidData(format!("quantity too large: {}", detail.quantity))
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_details (id, order_id, product_id, product_name, unit_price,
                                           quantity, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(detail.id.as_uuid())
            .bind(detail.order_id.as_uuid())
            .bind(detail.product_id.as_uuid())
            .bind(&detail.product_name)
            .bind(detail.unit_price.cents())
            .bind(quantity)
            .bind(detail.subtotal.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        }

        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        row.map(row_to_order).transpose()
    }

    async fn order_details(&mut self, id: OrderId) -> Result<Vec<OrderDetailRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, unit_price, quantity, subtotal
            FROM order_details
            WHERE order_id = $1
            ORDER BY product_name ASC, id ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(row_to_detail).collect()
    }

    async fn update_order(&mut self, order: &OrderRecord, expected: Version) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = $3, payment_status = $4, cancel_reason = $5,
                version = version + 1, updated_at = now()
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(expected.as_i64())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.cancel_reason)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if let Some(version) = version {
            return Ok(Version::new(version));
        }

        match self.order(order.id).await? {
            Some(current) => Err(StoreError::ConcurrencyConflict {
                entity: "order",
                id: order.id.to_string(),
                expected,
                actual: current.version,
            }),
            None => Err(StoreError::NotFound {
                entity: "order",
                id: order.id.to_string(),
            }),
        }
    }

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Page<OrderRecord>> {
        fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a OrderQuery) {
            builder.push(" WHERE 1=1");
            if let Some(user_id) = query.user_id {
                builder.push(" AND user_id = ").push_bind(user_id.as_uuid());
            }
            if let Some(status) = query.status {
                builder.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(payment_status) = query.payment_status {
                builder
                    .push(" AND payment_status = ")
                    .push_bind(payment_status.as_str());
            }
            if let Some(from) = query.from {
                builder.push(" AND created_at >= ").push_bind(from);
            }
            if let Some(to) = query.to {
                builder.push(" AND created_at <= ").push_bind(to);
            }
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_filters(&mut select, query);

        let column = match query.sort_by {
            OrderSortField::CreatedAt => "created_at",
            OrderSortField::TotalMoney => "total",
            OrderSortField::Status => "status",
        };
        let direction = match query.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        select.push(format!(" ORDER BY {column} {direction}, id {direction}"));
        select.push(" LIMIT ").push_bind(i64::from(query.limit));
        select.push(" OFFSET ").push_bind(query.offset() as i64);

        let rows = select
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(row_to_order)
                .collect::<Result<Vec<_>>>()?,
            total: total as u64,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn transactions_for_order(&mut self, id: OrderId) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(row_to_transaction).collect()
    }

    async fn transaction_by_code(&mut self, code: &str) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_code = $1"
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row.map(row_to_transaction).transpose()
    }

    async fn insert_transaction(&mut self, transaction: &TransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, order_id, method, transaction_code, amount, status,
                                      description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.order_id.map(|o| o.as_uuid()))
        .bind(transaction.method.as_str())
        .bind(&transaction.transaction_code)
        .bind(transaction.amount.cents())
        .bind(transaction.status.as_str())
        .bind(&transaction.description)
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_transaction_code")
            {
                return StoreError::DuplicateKey {
                    entity: "transaction",
                    key: transaction.transaction_code.clone(),
                };
            }
            map_db_error(e)
        })?;

        Ok(())
    }

    async fn update_transaction(&mut self, transaction: &TransactionRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET order_id = $2, method = $3, amount = $4, status = $5, description = $6,
                created_at = $7
            WHERE id = $1
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.order_id.map(|o| o.as_uuid()))
        .bind(transaction.method.as_str())
        .bind(transaction.amount.cents())
        .bind(transaction.status.as_str())
        .bind(&transaction.description)
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "transaction",
                id: transaction.id.to_string(),
            });
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(map_db_error)
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(map_db_error)
    }
}
