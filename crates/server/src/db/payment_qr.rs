//! Payment QR repository.
//!
//! A partial unique index allows at most one `ACTIVE` QR per order. Issuing a
//! new QR therefore always resolves the previous one first, inside the same
//! transaction that holds the order row lock.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};

use etuckshop_core::{OrderId, PaymentQrId, QrStatus};

use super::RepositoryError;
use crate::models::PaymentQr;

#[derive(sqlx::FromRow)]
struct PaymentQrRow {
    id: PaymentQrId,
    order_id: OrderId,
    payload: String,
    status: QrStatus,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl From<PaymentQrRow> for PaymentQr {
    fn from(r: PaymentQrRow) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            payload: r.payload,
            status: r.status,
            issued_at: r.issued_at,
            expires_at: r.expires_at,
            resolved_at: r.resolved_at,
        }
    }
}

/// The `ACTIVE` QR of an order, past expiry or not.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn active_for_order<'e>(
    executor: impl PgExecutor<'e>,
    order_id: OrderId,
) -> Result<Option<PaymentQr>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentQrRow>(
        r"
        SELECT id, order_id, payload, status, issued_at, expires_at, resolved_at
        FROM shop.payment_qr_codes
        WHERE order_id = $1 AND status = 'ACTIVE'
        ",
    )
    .bind(order_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(PaymentQr::from))
}

/// The most recently issued QR of an order, in any status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn latest_for_order(
    pool: &PgPool,
    order_id: OrderId,
) -> Result<Option<PaymentQr>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentQrRow>(
        r"
        SELECT id, order_id, payload, status, issued_at, expires_at, resolved_at
        FROM shop.payment_qr_codes
        WHERE order_id = $1
        ORDER BY issued_at DESC, id DESC
        LIMIT 1
        ",
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(PaymentQr::from))
}

/// `ACTIVE` QRs for a batch of orders.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn active_for_orders(
    pool: &PgPool,
    order_ids: &[i32],
) -> Result<Vec<PaymentQr>, RepositoryError> {
    let rows = sqlx::query_as::<_, PaymentQrRow>(
        r"
        SELECT id, order_id, payload, status, issued_at, expires_at, resolved_at
        FROM shop.payment_qr_codes
        WHERE order_id = ANY($1) AND status = 'ACTIVE'
        ",
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PaymentQr::from).collect())
}

/// Look up a QR by its exact payload.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_payload(
    pool: &PgPool,
    payload: &str,
) -> Result<Option<PaymentQr>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentQrRow>(
        r"
        SELECT id, order_id, payload, status, issued_at, expires_at, resolved_at
        FROM shop.payment_qr_codes
        WHERE payload = $1
        ",
    )
    .bind(payload)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(PaymentQr::from))
}

/// Store a newly issued QR.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order already has an active QR.
pub async fn insert(
    conn: &mut PgConnection,
    order_id: OrderId,
    payload: &str,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<PaymentQr, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentQrRow>(
        r"
        INSERT INTO shop.payment_qr_codes (order_id, payload, issued_at, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, order_id, payload, status, issued_at, expires_at, resolved_at
        ",
    )
    .bind(order_id)
    .bind(payload)
    .bind(issued_at)
    .bind(expires_at)
    .fetch_one(conn)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "order already has an active QR"))?;

    Ok(row.into())
}

/// Resolve the order's active QR, if any, to `status`.
///
/// Returns the number of QRs changed (0 or 1).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn resolve_active(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: QrStatus,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.payment_qr_codes
        SET status = $2, resolved_at = NOW()
        WHERE order_id = $1 AND status = 'ACTIVE'
        ",
    )
    .bind(order_id)
    .bind(status)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Mark every active QR past its expiry as expired.
///
/// Order rows are left untouched.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn expire_stale(pool: &PgPool) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.payment_qr_codes
        SET status = 'EXPIRED', resolved_at = NOW()
        WHERE status = 'ACTIVE' AND expires_at <= NOW()
        ",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
