//! Customer order and payment route handlers.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

use etuckshop_core::{OrderId, PaymentType};

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::{Order, QrCodeView, QrStatusView};
use crate::response::{ApiResponse, ApiResult};
use crate::services::{OrderService, PaymentService};
use crate::state::AppState;

/// Body for checkout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub payment_type: PaymentType,
}

fn orders(state: &AppState) -> OrderService<'_> {
    OrderService::new(state.pool(), state.catalog())
}

fn payments(state: &AppState) -> PaymentService<'_> {
    PaymentService::new(state.pool(), state.qr_signer(), state.config().qr.ttl)
}

/// Place an order from the cart.
///
/// POST /orders/checkout
///
/// # Errors
///
/// Returns 400 for an empty cart or lines stock can't cover.
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, ApiResponse<Order>)> {
    let order = orders(&state).checkout(user.id, body.payment_type).await?;
    let message = format!("Order {} placed", order.order_number);
    Ok(ApiResponse::with_message(order, message).created())
}

/// The user's orders, newest first.
///
/// GET /orders
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<Vec<Order>> {
    Ok(ApiResponse::ok(orders(&state).list_mine(user.id).await?))
}

/// GET /orders/{id}
///
/// # Errors
///
/// Returns 404 if the order doesn't exist or isn't the user's.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    Ok(ApiResponse::ok(orders(&state).get_for(&user, id).await?))
}

/// POST /orders/{id}/cancel
///
/// # Errors
///
/// Returns 409 once the order is completed or cancelled.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    let order = orders(&state).cancel(&user, id).await?;
    Ok(ApiResponse::with_message(order, "Order cancelled"))
}

/// Generate or return the QR for a pending cash order.
///
/// POST /orders/pay/cash/{id}
///
/// # Errors
///
/// Returns 400 for a PayNow order and 409 unless the order is pending.
pub async fn pay_cash(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> ApiResult<QrCodeView> {
    let qr = payments(&state).issue_qr(&user, id, PaymentType::Cash).await?;
    Ok(ApiResponse::with_message(qr, "Show this QR code at the counter"))
}

/// Generate or return the QR for a pending PayNow order.
///
/// POST /orders/pay/paynow/{id}
///
/// # Errors
///
/// Returns 400 for a cash order and 409 unless the order is pending.
pub async fn pay_paynow(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> ApiResult<QrCodeView> {
    let qr = payments(&state).issue_qr(&user, id, PaymentType::Paynow).await?;
    Ok(ApiResponse::with_message(qr, "Scan to pay with PayNow"))
}

/// Simulated PayNow settlement.
///
/// POST /orders/pay/paynow/process/{id}
///
/// # Errors
///
/// Returns 400 without an unexpired QR.
pub async fn process_paynow(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    let order = payments(&state).process_paynow(&user, id).await?;
    Ok(ApiResponse::with_message(order, "Payment received"))
}

/// Current QR state, polled by the countdown.
///
/// GET /orders/{id}/qr
///
/// # Errors
///
/// Returns 404 if the order isn't visible to the user.
pub async fn qr_status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> ApiResult<QrStatusView> {
    Ok(ApiResponse::ok(payments(&state).qr_status(&user, id).await?))
}
