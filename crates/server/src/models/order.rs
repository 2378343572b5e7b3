//! Order and payment QR domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use etuckshop_core::{
    OrderId, OrderItemId, OrderNumber, OrderStatus, PaymentQrId, PaymentType, ProductId, QrState,
    QrStatus, QrWindow, UserId,
};

/// A line of an order, priced at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    /// Product name at checkout.
    pub product_name: String,
    /// Unit price at checkout.
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// An order with its items and the currently active QR, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    /// Customer name, shown in the back-office.
    pub customer_name: String,
    pub status: OrderStatus,
    pub payment_type: PaymentType,
    pub total_amount: Decimal,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Payload of the active, unexpired QR.
    pub qr_code: Option<String>,
    pub qr_expires_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Attach `qr` if it is still usable at `now`.
    #[must_use]
    pub fn with_active_qr(mut self, qr: Option<&PaymentQr>, now: DateTime<Utc>) -> Self {
        match qr.filter(|qr| qr.is_usable(now)) {
            Some(qr) => {
                self.qr_code = Some(qr.payload.clone());
                self.qr_expires_at = Some(qr.expires_at);
            }
            None => {
                self.qr_code = None;
                self.qr_expires_at = None;
            }
        }
        self
    }
}

/// A stored payment QR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentQr {
    pub id: PaymentQrId,
    pub order_id: OrderId,
    pub payload: String,
    pub status: QrStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// When the QR left `ACTIVE`.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PaymentQr {
    /// Validity window of this QR.
    #[must_use]
    pub const fn window(&self) -> QrWindow {
        QrWindow {
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }

    /// Active in storage and not yet past expiry.
    ///
    /// The sweep lags behind the clock, so both are checked.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == QrStatus::Active && !self.window().is_expired(now)
    }

    /// Observed state at `now`.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> QrState {
        match self.status {
            QrStatus::Used => QrState::None,
            // Cancelled or rejected orders retire their QR before its window ends
            QrStatus::Expired => QrState::Expired {
                expired_at: self
                    .resolved_at
                    .map_or(self.expires_at, |resolved| resolved.min(self.expires_at)),
            },
            QrStatus::Active => self.window().state(now),
        }
    }
}

/// Response for `POST /orders/pay/{cash,paynow}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeView {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub payment_type: PaymentType,
    pub total_amount: Decimal,
    /// Opaque payload to render as a QR image.
    pub qr_code: String,
    pub expires_at: DateTime<Utc>,
    pub seconds_remaining: u64,
}

/// Response for `GET /orders/{id}/qr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrStatusView {
    pub order_id: OrderId,
    pub order_status: OrderStatus,
    pub payment_type: PaymentType,
    /// Payload, only while the QR is active.
    pub qr_code: Option<String>,
    pub qr: QrState,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    fn qr(status: QrStatus) -> PaymentQr {
        PaymentQr {
            id: PaymentQrId::new(1),
            order_id: OrderId::new(9),
            payload: "payload".to_string(),
            status,
            issued_at: at(0),
            expires_at: at(900),
            resolved_at: None,
        }
    }

    #[test]
    fn test_active_qr_expires_on_clock_before_sweep() {
        let qr = qr(QrStatus::Active);
        assert!(qr.is_usable(at(899)));
        assert!(!qr.is_usable(at(900)));
        assert_eq!(qr.state(at(1000)), QrState::Expired { expired_at: at(900) });
    }

    #[test]
    fn test_resolved_qr_states() {
        assert_eq!(qr(QrStatus::Used).state(at(10)), QrState::None);
        assert!(!qr(QrStatus::Used).is_usable(at(10)));
        assert_eq!(
            qr(QrStatus::Expired).state(at(10)),
            QrState::Expired { expired_at: at(900) }
        );
    }

    #[test]
    fn test_qr_retired_early_reports_resolution_time() {
        let retired = PaymentQr {
            resolved_at: Some(at(120)),
            ..qr(QrStatus::Expired)
        };
        assert_eq!(retired.state(at(130)), QrState::Expired { expired_at: at(120) });

        // The sweep runs after the window closes; report the window's end
        let swept = PaymentQr {
            resolved_at: Some(at(930)),
            ..qr(QrStatus::Expired)
        };
        assert_eq!(swept.state(at(940)), QrState::Expired { expired_at: at(900) });
    }
}
