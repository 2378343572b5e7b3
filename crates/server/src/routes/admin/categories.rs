//! Category management.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

use etuckshop_core::CategoryId;

use crate::db::categories::CategoryFields;
use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireAdmin;
use crate::models::Category;
use crate::response::{ApiResponse, ApiResult};
use crate::services::CatalogService;
use crate::state::AppState;

/// Body for creating or renaming a category.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<CategoryRequest> for CategoryFields {
    fn from(r: CategoryRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
        }
    }
}

/// GET /admin/categories
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Vec<Category>> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    Ok(ApiResponse::ok(catalog.list_categories().await?.as_ref().clone()))
}

/// POST /admin/categories
///
/// # Errors
///
/// Returns 400 for a blank name and 409 if the name is taken.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, ApiResponse<Category>)> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let category = catalog.create_category(body.into()).await?;
    Ok(ApiResponse::with_message(category, "Category created").created())
}

/// PUT /admin/categories/{id}
///
/// # Errors
///
/// Returns 404 for an unknown category and 409 if the name is taken.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryRequest>,
) -> ApiResult<Category> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let category = catalog.update_category(id, body.into()).await?;
    Ok(ApiResponse::with_message(category, "Category updated"))
}

/// DELETE /admin/categories/{id}
///
/// # Errors
///
/// Returns 409 while the category still has products.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> ApiResult<()> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    catalog.delete_category(id).await?;
    Ok(ApiResponse::message("Category deleted"))
}
