//! Back-office route handlers. Every handler takes [`RequireAdmin`].
//!
//! ```text
//! GET    /admin/dashboard
//! GET    /admin/categories          POST /admin/categories
//! PUT    /admin/categories/{id}     DELETE /admin/categories/{id}
//! GET    /admin/products            POST /admin/products
//! PUT    /admin/products/{id}       DELETE /admin/products/{id}
//! GET    /admin/inventory?level=
//! PUT    /admin/inventory/{id}      POST /admin/inventory/{id}/adjust
//! GET    /admin/orders?status=&paymentType=
//! GET    /admin/orders/{id}
//! POST   /admin/orders/{id}/complete
//! POST   /admin/orders/{id}/reject
//! POST   /admin/orders/verify-qr
//! ```
//!
//! [`RequireAdmin`]: crate::middleware::RequireAdmin

pub mod categories;
pub mod dashboard;
pub mod inventory;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::error::AppError;
use crate::state::AppState;

/// Create the back-office router, nested under `/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::show))
        .route("/categories", get(categories::index).post(categories::create))
        .route(
            "/categories/{id}",
            put(categories::update).delete(categories::delete),
        )
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            put(products::update).delete(products::delete),
        )
        .route("/inventory", get(inventory::index))
        .route("/inventory/{id}", put(inventory::set_stock))
        .route("/inventory/{id}/adjust", post(inventory::adjust))
        .route("/orders", get(orders::index))
        .route("/orders/verify-qr", post(orders::verify_qr))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/complete", post(orders::complete))
        .route("/orders/{id}/reject", post(orders::reject))
}

/// Parse an optional, case-insensitive enum query parameter.
fn parse_param<T>(name: &str, value: Option<&str>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| AppError::BadRequest(format!("invalid {name}: {v}")))
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use etuckshop_core::{OrderStatus, StockLevel};

    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param::<OrderStatus>("status", Some("paid")).unwrap(),
            Some(OrderStatus::Paid)
        );
        assert_eq!(parse_param::<OrderStatus>("status", Some("")).unwrap(), None);
        assert_eq!(parse_param::<StockLevel>("level", None).unwrap(), None);
        assert!(matches!(
            parse_param::<StockLevel>("level", Some("plenty")),
            Err(AppError::BadRequest(_))
        ));
    }
}
