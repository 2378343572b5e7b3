//! Payment QR issuing, status, simulated PayNow settlement and counter
//! verification.

use std::time::Duration;

use chrono::{SubsecRound, Utc};
use sqlx::PgPool;
use tracing::{info, instrument};

use etuckshop_core::order::apply;
use etuckshop_core::{OrderId, OrderStatus, OrderTransition, PaymentType, QrState, QrStatus, QrWindow};

use super::orders::transition_locked;
use super::qr_token::{QrSigner, QrToken};
use crate::db::orders::{self, OrderRepository};
use crate::db::{RepositoryError, payment_qr};
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, Order, PaymentQr, QrCodeView, QrStatusView};

/// Payment service.
pub struct PaymentService<'a> {
    pool: &'a PgPool,
    signer: &'a QrSigner,
    ttl: Duration,
}

impl<'a> PaymentService<'a> {
    /// Create a new payment service issuing QRs valid for `ttl`.
    #[must_use]
    pub const fn new(pool: &'a PgPool, signer: &'a QrSigner, ttl: Duration) -> Self {
        Self { pool, signer, ttl }
    }

    /// Return the order's live QR, or issue a new one.
    ///
    /// `expected` is the payment type named by the route; a cash route can't
    /// issue a QR for a PayNow order and vice versa.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a payment type mismatch and
    /// `AppError::Conflict` unless the order is pending.
    #[instrument(skip(self, user), fields(user_id = %user.id, order_id = %id))]
    pub async fn issue_qr(
        &self,
        user: &CurrentUser,
        id: OrderId,
        expected: PaymentType,
    ) -> Result<QrCodeView> {
        let order = self.owned_order(user, id).await?;
        if order.payment_type != expected {
            return Err(AppError::BadRequest(format!(
                "Order {} is a {} order",
                order.order_number, order.payment_type
            )));
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let head = orders::lock_head(&mut tx, id)
            .await?
            .ok_or_else(|| order_not_found(id))?;
        if head.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "A QR code can only be generated for a pending order; this one is {}",
                head.status
            )));
        }

        let now = Utc::now().trunc_subsecs(0);
        if let Some(existing) = payment_qr::active_for_order(&mut *tx, id).await? {
            if existing.is_usable(now) {
                return Ok(qr_view(&order, &existing, now));
            }
            // Sweep hasn't caught up yet
            payment_qr::resolve_active(&mut tx, id, QrStatus::Expired).await?;
        }

        let window = QrWindow::open(now, self.ttl);
        let payload = self.signer.sign(&QrToken {
            order_id: id,
            order_number: order.order_number.clone(),
            expires_at: window.expires_at,
        });
        let qr =
            payment_qr::insert(&mut tx, id, &payload, window.issued_at, window.expires_at).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        info!(expires_at = %qr.expires_at, "Payment QR issued");
        Ok(qr_view(&order, &qr, now))
    }

    /// Current QR state for an order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order isn't visible to `user`.
    pub async fn qr_status(&self, user: &CurrentUser, id: OrderId) -> Result<QrStatusView> {
        let order = self.visible_order(user, id).await?;
        let latest = payment_qr::latest_for_order(self.pool, id).await?;
        let now = Utc::now();

        let qr = latest.as_ref().map_or(QrState::None, |q| q.state(now));
        let qr_code = latest
            .filter(|q| q.is_usable(now))
            .map(|q| q.payload);

        Ok(QrStatusView {
            order_id: order.id,
            order_status: order.status,
            payment_type: order.payment_type,
            qr_code,
            qr,
        })
    }

    /// Settle a PayNow order against its live QR.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transition` for cash or non-pending orders and
    /// `AppError::BadRequest` when no unexpired QR exists.
    #[instrument(skip(self, user), fields(user_id = %user.id, order_id = %id))]
    pub async fn process_paynow(&self, user: &CurrentUser, id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let head = orders::lock_head(&mut tx, id)
            .await?
            .filter(|h| h.user_id == user.id)
            .ok_or_else(|| order_not_found(id))?;

        // Refuse cash or settled orders before looking at the QR
        apply(head.status, head.payment_type, OrderTransition::Pay)?;

        let qr = payment_qr::active_for_order(&mut *tx, id).await?;
        if !qr.is_some_and(|q| q.is_usable(Utc::now())) {
            return Err(AppError::BadRequest(
                "No active QR code for this order; generate a new one".to_string(),
            ));
        }

        transition_locked(&mut tx, head, OrderTransition::Pay).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!("PayNow payment settled");
        self.load(id).await
    }

    /// Check a payload scanned at the counter and return its order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Qr` for a payload this server didn't sign,
    /// `AppError::BadRequest` for a retired or expired QR and
    /// `AppError::Conflict` if the order is no longer pending.
    #[instrument(skip(self, payload))]
    pub async fn verify_qr(&self, payload: &str) -> Result<Order> {
        let token = self.signer.verify(payload.trim())?;

        let qr = payment_qr::find_by_payload(self.pool, payload.trim())
            .await?
            .filter(|q| q.order_id == token.order_id)
            .ok_or_else(|| AppError::BadRequest("QR code is not recognised".to_string()))?;

        if !qr.is_usable(Utc::now()) {
            return Err(AppError::BadRequest(
                "QR code has expired or was already used".to_string(),
            ));
        }

        let order = self.load(token.order_id).await?;
        if order.order_number != token.order_number {
            return Err(AppError::BadRequest("QR code is not recognised".to_string()));
        }
        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Order {} is {}",
                order.order_number, order.status
            )));
        }

        info!(order_id = %order.id, "Payment QR verified");
        Ok(order)
    }

    async fn load(&self, id: OrderId) -> Result<Order> {
        OrderRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| order_not_found(id))
    }

    async fn owned_order(&self, user: &CurrentUser, id: OrderId) -> Result<Order> {
        let order = self.load(id).await?;
        if order.user_id != user.id {
            return Err(order_not_found(id));
        }
        Ok(order)
    }

    async fn visible_order(&self, user: &CurrentUser, id: OrderId) -> Result<Order> {
        let order = self.load(id).await?;
        if order.user_id != user.id && !user.is_admin() {
            return Err(order_not_found(id));
        }
        Ok(order)
    }
}

fn qr_view(order: &Order, qr: &PaymentQr, now: chrono::DateTime<Utc>) -> QrCodeView {
    QrCodeView {
        order_id: order.id,
        order_number: order.order_number.clone(),
        payment_type: order.payment_type,
        total_amount: order.total_amount,
        qr_code: qr.payload.clone(),
        expires_at: qr.expires_at,
        seconds_remaining: qr.window().seconds_remaining(now),
    }
}

fn order_not_found(id: OrderId) -> AppError {
    AppError::NotFound(format!("Order {id} not found"))
}
