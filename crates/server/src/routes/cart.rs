//! Cart route handlers. All require a logged-in user.

use axum::extract::State;
use serde::Deserialize;

use etuckshop_core::ProductId;

use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::CartView;
use crate::response::{ApiResponse, ApiResult};
use crate::services::CartService;
use crate::state::AppState;

const fn one() -> i32 {
    1
}

/// Body for adding to the cart.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i32,
}

/// Body for setting a line's quantity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// GET /cart
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<CartView> {
    Ok(ApiResponse::ok(CartService::new(state.pool()).view(user.id).await?))
}

/// POST /cart/add
///
/// # Errors
///
/// Returns 400 if the line would exceed stock and 404 for an unknown
/// product.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddToCartRequest>,
) -> ApiResult<CartView> {
    let cart = CartService::new(state.pool())
        .add(user.id, body.product_id, body.quantity)
        .await?;
    Ok(ApiResponse::with_message(cart, "Added to cart"))
}

/// PUT /cart/update
///
/// # Errors
///
/// Returns 400 for an invalid quantity.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<UpdateCartRequest>,
) -> ApiResult<CartView> {
    let cart = CartService::new(state.pool())
        .update(user.id, body.product_id, body.quantity)
        .await?;
    Ok(ApiResponse::ok(cart))
}

/// DELETE /cart/remove/{productId}
///
/// # Errors
///
/// Returns 404 if the product isn't in the cart.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> ApiResult<CartView> {
    let cart = CartService::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(ApiResponse::with_message(cart, "Removed from cart"))
}

/// DELETE /cart/clear
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<CartView> {
    let cart = CartService::new(state.pool()).clear(user.id).await?;
    Ok(ApiResponse::with_message(cart, "Cart cleared"))
}
