//! Public catalog route handlers: products and categories.

use axum::extract::State;
use serde::Deserialize;

use etuckshop_core::{CategoryId, ProductId};

use crate::db::products::ProductFilter;
use crate::extract::{Path, Query};
use crate::models::{Category, CategoryDetail, Product};
use crate::response::{ApiResponse, ApiResult};
use crate::services::CatalogService;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
}

impl From<ProductQuery> for ProductFilter {
    fn from(q: ProductQuery) -> Self {
        Self {
            category_id: q.category_id,
            search: q
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            in_stock: q.in_stock,
        }
    }
}

/// List products.
///
/// GET /products?categoryId=&search=&inStock=
///
/// # Errors
///
/// Returns 400 for malformed query parameters.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Vec<Product>> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let products = catalog.list_products(&query.into()).await?;
    Ok(ApiResponse::ok(products.as_ref().clone()))
}

/// Product detail.
///
/// GET /products/{id}
///
/// # Errors
///
/// Returns 404 for an unknown product.
pub async fn show(State(state): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<Product> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    Ok(ApiResponse::ok(catalog.get_product(id).await?))
}

/// List categories with product counts.
///
/// GET /categories
///
/// # Errors
///
/// Returns 500 if the database is unavailable.
pub async fn categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    let categories = catalog.list_categories().await?;
    Ok(ApiResponse::ok(categories.as_ref().clone()))
}

/// Category detail with its products.
///
/// GET /categories/{id}
///
/// # Errors
///
/// Returns 404 for an unknown category.
pub async fn category(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> ApiResult<CategoryDetail> {
    let catalog = CatalogService::new(state.pool(), state.catalog());
    Ok(ApiResponse::ok(catalog.get_category(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_is_no_filter() {
        let filter: ProductFilter = ProductQuery {
            search: Some("   ".to_string()),
            ..ProductQuery::default()
        }
        .into();
        assert!(filter.is_empty());

        let filter: ProductFilter = ProductQuery {
            search: Some(" milo ".to_string()),
            ..ProductQuery::default()
        }
        .into();
        assert_eq!(filter.search.as_deref(), Some("milo"));
    }
}
