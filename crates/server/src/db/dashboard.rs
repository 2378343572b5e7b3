//! Aggregate queries for the back-office dashboard.

use rust_decimal::Decimal;
use sqlx::PgPool;

use etuckshop_core::OrderStatus;
use etuckshop_core::stock::LOW_STOCK_MAX;

use super::RepositoryError;
use crate::models::DashboardStats;
use crate::models::dashboard::OrderCounts;

#[derive(sqlx::FromRow)]
struct ProductTotalsRow {
    total_products: i64,
    low_stock_products: i64,
    out_of_stock_products: i64,
}

/// Compute dashboard figures.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn stats(pool: &PgPool) -> Result<DashboardStats, RepositoryError> {
    let per_status: Vec<(OrderStatus, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM shop.orders GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut orders = OrderCounts::default();
    for (status, count) in per_status {
        match status {
            OrderStatus::Pending => orders.pending = count,
            OrderStatus::Paid => orders.paid = count,
            OrderStatus::Completed => orders.completed = count,
            OrderStatus::Cancelled => orders.cancelled = count,
        }
    }

    let (revenue,): (Decimal,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_amount), 0) FROM shop.orders WHERE status = 'COMPLETED'",
    )
    .fetch_one(pool)
    .await?;

    let (today_orders,): (i64,) = sqlx::query_as(
        r"
        SELECT COUNT(*)
        FROM shop.orders
        WHERE created_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'
        ",
    )
    .fetch_one(pool)
    .await?;

    let products = sqlx::query_as::<_, ProductTotalsRow>(
        r"
        SELECT COUNT(*) AS total_products,
               COUNT(*) FILTER (WHERE stock BETWEEN 1 AND $1) AS low_stock_products,
               COUNT(*) FILTER (WHERE stock <= 0) AS out_of_stock_products
        FROM shop.products
        ",
    )
    .bind(LOW_STOCK_MAX)
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        total_orders: orders.total(),
        orders,
        revenue,
        today_orders,
        total_products: products.total_products,
        low_stock_products: products.low_stock_products,
        out_of_stock_products: products.out_of_stock_products,
    })
}
