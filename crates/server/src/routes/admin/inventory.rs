//! Inventory screen and stock changes.

use axum::extract::State;
use serde::Deserialize;

use etuckshop_core::{ProductId, StockLevel};

use super::parse_param;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::Product;
use crate::response::{ApiResponse, ApiResult};
use crate::services::CatalogService;
use crate::state::AppState;

/// Query parameters for the inventory listing.
#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    pub level: Option<String>,
}

/// Body for setting stock.
#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock: i32,
}

/// Body for a relative stock change.
#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i32,
}

/// GET /admin/inventory?level=
///
/// # Errors
///
/// Returns 400 for an unknown level.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<InventoryQuery>,
) -> ApiResult<Vec<Product>> {
    let level = parse_param::<StockLevel>("level", query.level.as_deref())?;
    let catalog = CatalogService::new(state.pool(), state.catalog());
    Ok(ApiResponse::ok(catalog.inventory(level).await?))
}

/// PUT /admin/inventory/{id}
///
/// # Errors
///
/// Returns 400 for negative stock and 404 for an unknown product.
pub async fn set_stock(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<SetStockRequest>,
) -> ApiResult<Product> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let product = catalog.set_stock(id, body.stock).await?;
    Ok(ApiResponse::with_message(product, "Stock updated"))
}

/// POST /admin/inventory/{id}/adjust
///
/// # Errors
///
/// Returns 409 if the adjustment would take stock below zero.
pub async fn adjust(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<AdjustStockRequest>,
) -> ApiResult<Product> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let product = catalog.adjust_stock(id, body.delta).await?;
    Ok(ApiResponse::with_message(product, "Stock adjusted"))
}
