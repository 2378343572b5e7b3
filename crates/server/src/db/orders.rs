//! Order repository.
//!
//! Status changes go through [`transition`], which only updates a row that
//! is still in the expected status. Two concurrent transitions on the same
//! order therefore cannot both succeed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use etuckshop_core::{
    OrderId, OrderItemId, OrderNumber, OrderStatus, PaymentType, ProductId, UserId,
};

use super::RepositoryError;
use super::payment_qr;
use crate::models::{Order, OrderItem, PaymentQr};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    customer_name: String,
    status: OrderStatus,
    payment_type: PaymentType,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            unit_price: r.unit_price,
            quantity: r.quantity,
            subtotal: r.unit_price * Decimal::from(r.quantity),
        }
    }
}

/// The status-bearing part of an order, read under a row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderHead {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_type: PaymentType,
}

/// A line to insert at checkout.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Filters for the back-office order list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_type: Option<PaymentType>,
}

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get one order with items and its active QR.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails and
    /// `RepositoryError::DataCorruption` for a malformed order number.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT o.id, o.order_number, o.user_id, u.name AS customer_name, o.status,
                   o.payment_type, o.total_amount, o.created_at, o.paid_at,
                   o.completed_at, o.cancelled_at
            FROM shop.orders o
            JOIN shop.users u ON u.id = o.user_id
            WHERE o.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut orders = self.assemble(vec![row]).await?;
        Ok(orders.pop())
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT o.id, o.order_number, o.user_id, u.name AS customer_name, o.status,
                   o.payment_type, o.total_amount, o.created_at, o.paid_at,
                   o.completed_at, o.cancelled_at
            FROM shop.orders o
            JOIN shop.users u ON u.id = o.user_id
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.assemble(rows).await
    }

    /// All orders matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT o.id, o.order_number, o.user_id, u.name AS customer_name, o.status,
                   o.payment_type, o.total_amount, o.created_at, o.paid_at,
                   o.completed_at, o.cancelled_at
            FROM shop.orders o
            JOIN shop.users u ON u.id = o.user_id
            WHERE ($1::shop.order_status IS NULL OR o.status = $1)
              AND ($2::shop.payment_type IS NULL OR o.payment_type = $2)
            ORDER BY o.created_at DESC, o.id DESC
            ",
        )
        .bind(filter.status)
        .bind(filter.payment_type)
        .fetch_all(self.pool)
        .await?;

        self.assemble(rows).await
    }

    /// Attach items and active QRs to order rows, keeping row order.
    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();

        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, product_name, unit_price, quantity
            FROM shop.order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.into());
        }

        let qrs: HashMap<OrderId, PaymentQr> = payment_qr::active_for_orders(self.pool, &ids)
            .await?
            .into_iter()
            .map(|qr| (qr.order_id, qr))
            .collect();

        let now = Utc::now();
        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                let qr = qrs.get(&row.id);
                into_order(row, order_items).map(|o| o.with_active_qr(qr, now))
            })
            .collect()
    }
}

fn into_order(row: OrderRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let order_number = OrderNumber::parse(&row.order_number).map_err(|e| {
        RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
    })?;

    Ok(Order {
        id: row.id,
        order_number,
        user_id: row.user_id,
        customer_name: row.customer_name,
        status: row.status,
        payment_type: row.payment_type,
        total_amount: row.total_amount,
        items,
        created_at: row.created_at,
        paid_at: row.paid_at,
        completed_at: row.completed_at,
        cancelled_at: row.cancelled_at,
        qr_code: None,
        qr_expires_at: None,
    })
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Insert an order row. Returns `None` if the order number is taken.
///
/// The collision is absorbed with `ON CONFLICT` so the surrounding
/// transaction stays usable for a retry.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    order_number: &OrderNumber,
    payment_type: PaymentType,
    total_amount: Decimal,
) -> Result<Option<OrderId>, RepositoryError> {
    let row: Option<(OrderId,)> = sqlx::query_as(
        r"
        INSERT INTO shop.orders (order_number, user_id, payment_type, total_amount)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (order_number) DO NOTHING
        RETURNING id
        ",
    )
    .bind(order_number.as_str())
    .bind(user_id)
    .bind(payment_type)
    .bind(total_amount)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|(id,)| id))
}

/// Insert the items of a new order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn insert_items(
    conn: &mut PgConnection,
    order_id: OrderId,
    items: &[NewOrderItem],
) -> Result<(), RepositoryError> {
    for item in items {
        sqlx::query(
            r"
            INSERT INTO shop.order_items (order_id, product_id, product_name, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(item.unit_price)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Read and lock an order's status row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_head(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<OrderHead>, RepositoryError> {
    let head = sqlx::query_as::<_, OrderHead>(
        r"
        SELECT id, user_id, status, payment_type
        FROM shop.orders
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(head)
}

/// Move an order from `from` to `to`, stamping the matching timestamp.
///
/// Completing also stamps `paid_at` when it is still unset (cash collected at
/// pickup).
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order is no longer in `from`.
pub async fn transition(
    conn: &mut PgConnection,
    id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.orders
        SET status = $3,
            paid_at = CASE WHEN $3 IN ('PAID', 'COMPLETED') THEN COALESCE(paid_at, NOW())
                           ELSE paid_at END,
            completed_at = CASE WHEN $3 = 'COMPLETED' THEN NOW() ELSE completed_at END,
            cancelled_at = CASE WHEN $3 = 'CANCELLED' THEN NOW() ELSE cancelled_at END,
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        ",
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "order {id} is no longer {from}"
        )));
    }
    Ok(())
}

/// `(product, quantity)` pairs of an order, for restoring stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn item_quantities(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
    let rows: Vec<(ProductId, i32)> = sqlx::query_as(
        r"
        SELECT product_id, SUM(quantity)::INTEGER
        FROM shop.order_items
        WHERE order_id = $1
        GROUP BY product_id
        ORDER BY product_id
        ",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}
