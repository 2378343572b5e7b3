//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Accounts
//! POST   /auth/register            - Create customer account (rate limited)
//! POST   /auth/login               - Log in (rate limited)
//! POST   /auth/logout              - Log out
//! GET    /auth/me                  - Current user
//!
//! # Catalog
//! GET    /products                 - Product listing (?categoryId=&search=&inStock=)
//! GET    /products/{id}            - Product detail
//! GET    /categories               - Category listing with product counts
//! GET    /categories/{id}          - Category detail with products
//!
//! # Cart (requires auth)
//! GET    /cart                     - Cart with totals and stock warnings
//! POST   /cart/add                 - Add units of a product
//! PUT    /cart/update              - Set a line's quantity (0 removes)
//! DELETE /cart/remove/{productId}  - Remove a line
//! DELETE /cart/clear               - Empty the cart
//!
//! # Orders (requires auth)
//! POST   /orders/checkout          - Place an order from the cart
//! GET    /orders                   - My orders
//! GET    /orders/{id}              - Order detail
//! POST   /orders/{id}/cancel       - Cancel my order
//! GET    /orders/{id}/qr           - QR state for the countdown
//! POST   /orders/pay/cash/{id}     - QR for a cash order
//! POST   /orders/pay/paynow/{id}   - QR for a PayNow order
//! POST   /orders/pay/paynow/process/{id} - Simulated PayNow settlement
//!
//! # Back-office (requires admin)
//! /admin/...                       - See [`admin`]
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/{id}", get(catalog::show))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::categories))
        .route("/{id}", get(catalog::category))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", put(cart::update))
        .route("/remove/{product_id}", delete(cart::remove))
        .route("/clear", delete(cart::clear))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/checkout", post(orders::checkout))
        .route("/pay/cash/{id}", post(orders::pay_cash))
        .route("/pay/paynow/{id}", post(orders::pay_paynow))
        .route("/pay/paynow/process/{id}", post(orders::process_paynow))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/qr", get(orders::qr_status))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin::routes())
        .layer(api_rate_limiter())
}
