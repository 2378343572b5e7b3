//! Order management and counter QR verification.

use axum::extract::State;
use serde::Deserialize;

use etuckshop_core::{OrderId, OrderStatus, PaymentType};

use super::parse_param;
use crate::db::orders::OrderFilter;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::Order;
use crate::response::{ApiResponse, ApiResult};
use crate::services::{OrderService, PaymentService};
use crate::state::AppState;

/// Query parameters for the order listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    pub status: Option<String>,
    pub payment_type: Option<String>,
}

/// Body for QR verification.
#[derive(Debug, Deserialize)]
pub struct VerifyQrRequest {
    pub payload: String,
}

/// GET /admin/orders?status=&paymentType=
///
/// # Errors
///
/// Returns 400 for an unknown status or payment type.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Vec<Order>> {
    let filter = OrderFilter {
        status: parse_param::<OrderStatus>("status", query.status.as_deref())?,
        payment_type: parse_param::<PaymentType>("paymentType", query.payment_type.as_deref())?,
    };
    let service = OrderService::new(state.pool(), state.catalog());
    Ok(ApiResponse::ok(service.list(filter).await?))
}

/// GET /admin/orders/{id}
///
/// # Errors
///
/// Returns 404 for an unknown order.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    let service = OrderService::new(state.pool(), state.catalog());
    Ok(ApiResponse::ok(service.get_for(&admin, id).await?))
}

/// POST /admin/orders/{id}/complete
///
/// # Errors
///
/// Returns 409 unless the order is paid, or a pending cash order.
pub async fn complete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    let service = OrderService::new(state.pool(), state.catalog());
    let order = service.complete(id).await?;
    tracing::info!(admin_id = %admin.id, order_id = %id, "Order completed");
    Ok(ApiResponse::with_message(order, "Order completed"))
}

/// POST /admin/orders/{id}/reject
///
/// # Errors
///
/// Returns 409 once the order is terminal.
pub async fn reject(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    let service = OrderService::new(state.pool(), state.catalog());
    let order = service.reject(id).await?;
    tracing::info!(admin_id = %admin.id, order_id = %id, "Order rejected");
    Ok(ApiResponse::with_message(order, "Order rejected"))
}

/// Check a scanned QR payload.
///
/// POST /admin/orders/verify-qr
///
/// # Errors
///
/// Returns 400 for a forged, expired or retired QR.
pub async fn verify_qr(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<VerifyQrRequest>,
) -> ApiResult<Order> {
    let service = PaymentService::new(state.pool(), state.qr_signer(), state.config().qr.ttl);
    let order = service.verify_qr(&body.payload).await?;
    let message = format!("QR valid for order {}", order.order_number);
    Ok(ApiResponse::with_message(order, message))
}
