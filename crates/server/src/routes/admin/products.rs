//! Product management.

use axum::{extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use etuckshop_core::{CategoryId, ProductId};

use crate::db::products::{ProductFields, ProductFilter};
use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireAdmin;
use crate::models::Product;
use crate::response::{ApiResponse, ApiResult};
use crate::services::CatalogService;
use crate::state::AppState;

/// Body for creating or replacing a product.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub category_id: CategoryId,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<ProductRequest> for ProductFields {
    fn from(r: ProductRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
            category_id: r.category_id,
            image: r.image,
        }
    }
}

/// GET /admin/products
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Vec<Product>> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let products = catalog.list_products(&ProductFilter::default()).await?;
    Ok(ApiResponse::ok(products.as_ref().clone()))
}

/// POST /admin/products
///
/// # Errors
///
/// Returns 400 for invalid fields or an unknown category.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<ProductRequest>,
) -> Result<(StatusCode, ApiResponse<Product>)> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let product = catalog.create_product(body.into()).await?;
    Ok(ApiResponse::with_message(product, "Product created").created())
}

/// PUT /admin/products/{id}
///
/// # Errors
///
/// Returns 400 for invalid fields and 404 for an unknown product.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductRequest>,
) -> ApiResult<Product> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let product = catalog.update_product(id, body.into()).await?;
    Ok(ApiResponse::with_message(product, "Product updated"))
}

/// DELETE /admin/products/{id}
///
/// # Errors
///
/// Returns 409 if any order references the product.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> ApiResult<()> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    catalog.delete_product(id).await?;
    Ok(ApiResponse::message("Product deleted"))
}
