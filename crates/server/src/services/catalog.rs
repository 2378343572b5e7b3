//! Catalog reads and back-office catalog writes.
//!
//! Reads go through the [`CatalogCache`]; writes go through
//! [`CatalogCache::mutate`] so cached entries show the new value while the
//! database write is in flight and roll back if it fails.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use etuckshop_core::{CategoryId, ProductId, StockLevel};

use crate::cache::{CacheKey, CacheValue, CatalogCache};
use crate::db::categories::{CategoryFields, CategoryRepository};
use crate::db::products::{ProductFields, ProductFilter, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::{Category, CategoryDetail, Product};

/// Longest accepted product or category name.
const MAX_NAME_LENGTH: usize = 120;

/// Catalog service.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CatalogCache) -> Self {
        Self { pool, cache }
    }

    const fn products_repo(&self) -> ProductRepository<'a> {
        ProductRepository::new(self.pool)
    }

    const fn categories_repo(&self) -> CategoryRepository<'a> {
        CategoryRepository::new(self.pool)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// List products. Only the unfiltered listing is cached.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Arc<Vec<Product>>> {
        if !filter.is_empty() {
            return Ok(Arc::new(self.products_repo().list(filter).await?));
        }

        if let Some(products) = self.cache.products().await {
            return Ok(products);
        }

        let products = Arc::new(self.products_repo().list(filter).await?);
        self.cache
            .insert(CacheKey::Products, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist.
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        if let Some(product) = self.cache.product(id).await {
            return Ok(product);
        }

        let product = self
            .products_repo()
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;

        self.cache
            .insert(
                CacheKey::Product(id),
                CacheValue::Product(Box::new(product.clone())),
            )
            .await;
        Ok(product)
    }

    /// List categories with product counts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Arc<Vec<Category>>> {
        if let Some(categories) = self.cache.categories().await {
            return Ok(categories);
        }

        let categories = Arc::new(self.categories_repo().list().await?);
        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    /// Get one category with its products.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the category doesn't exist.
    pub async fn get_category(&self, id: CategoryId) -> Result<CategoryDetail> {
        if let Some(detail) = self.cache.category(id).await {
            return Ok(detail);
        }

        let category = self
            .categories_repo()
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {id} not found")))?;

        let products = self
            .products_repo()
            .list(&ProductFilter {
                category_id: Some(id),
                ..ProductFilter::default()
            })
            .await?;

        let detail = CategoryDetail { category, products };
        self.cache
            .insert(
                CacheKey::Category(id),
                CacheValue::Category(Box::new(detail.clone())),
            )
            .await;
        Ok(detail)
    }

    /// Products for the inventory screen, optionally limited to one level.
    ///
    /// Not cached; stock changes too often.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn inventory(&self, level: Option<StockLevel>) -> Result<Vec<Product>> {
        Ok(self.products_repo().list_inventory(level).await?)
    }

    // =========================================================================
    // Category writes
    // =========================================================================

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields and a conflict if
    /// the name is taken.
    #[instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn create_category(&self, fields: CategoryFields) -> Result<Category> {
        let fields = normalize_category(fields)?;
        let repo = self.categories_repo();

        self.cache
            .mutate(CacheKey::Categories, None, async {
                repo.create(&fields).await.map_err(AppError::from)
            })
            .await
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields, not found, or a
    /// conflict if the name is taken.
    #[instrument(skip(self, fields), fields(category_id = %id))]
    pub async fn update_category(&self, id: CategoryId, fields: CategoryFields) -> Result<Category> {
        let fields = normalize_category(fields)?;
        let repo = self.categories_repo();

        let optimistic = self.cache.category(id).await.map(|mut detail| {
            detail.category.name.clone_from(&fields.name);
            detail.category.description.clone_from(&fields.description);
            CacheValue::Category(Box::new(detail))
        });

        self.cache
            .mutate(CacheKey::Category(id), optimistic, async {
                repo.update(id, &fields).await.map_err(AppError::from)
            })
            .await
    }

    /// Delete an empty category.
    ///
    /// # Errors
    ///
    /// Returns a conflict while products remain in the category.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        let repo = self.categories_repo();

        self.cache
            .mutate(CacheKey::Category(id), None, async {
                repo.delete(id).await.map_err(AppError::from)
            })
            .await
    }

    // =========================================================================
    // Product writes
    // =========================================================================

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields or an unknown
    /// category.
    #[instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn create_product(&self, fields: ProductFields) -> Result<Product> {
        let fields = normalize_product(fields)?;
        let repo = self.products_repo();

        self.cache
            .mutate(CacheKey::Products, None, async {
                repo.create(&fields).await.map_err(unknown_category)
            })
            .await
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields or an unknown
    /// category, and not found if the product doesn't exist.
    #[instrument(skip(self, fields), fields(product_id = %id))]
    pub async fn update_product(&self, id: ProductId, fields: ProductFields) -> Result<Product> {
        let fields = normalize_product(fields)?;
        let repo = self.products_repo();

        // Only predictable while the category stays the same
        let optimistic = self
            .cache
            .product(id)
            .await
            .filter(|p| p.category_id == fields.category_id)
            .map(|mut p| {
                p.name.clone_from(&fields.name);
                p.description.clone_from(&fields.description);
                p.price = fields.price;
                p.image.clone_from(&fields.image);
                set_stock_on(&mut p, fields.stock);
                CacheValue::Product(Box::new(p))
            });

        self.cache
            .mutate(CacheKey::Product(id), optimistic, async {
                repo.update(id, &fields).await.map_err(unknown_category)
            })
            .await
    }

    /// Delete a product with no order history.
    ///
    /// # Errors
    ///
    /// Returns a conflict if order items reference the product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        let repo = self.products_repo();

        self.cache
            .mutate(CacheKey::Product(id), None, async {
                repo.delete(id).await.map_err(AppError::from)
            })
            .await
    }

    /// Set a product's stock.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for negative stock and not found if the
    /// product doesn't exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product> {
        if stock < 0 {
            return Err(AppError::BadRequest("Stock cannot be negative".to_string()));
        }
        let repo = self.products_repo();

        let optimistic = self.cache.product(id).await.map(|mut p| {
            set_stock_on(&mut p, stock);
            CacheValue::Product(Box::new(p))
        });

        self.cache
            .mutate(CacheKey::Product(id), optimistic, async {
                repo.set_stock(id, stock).await.map_err(AppError::from)
            })
            .await
    }

    /// Add `delta` to a product's stock.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a zero delta, and a conflict if the
    /// result would go below zero.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product> {
        if delta == 0 {
            return Err(AppError::BadRequest("Adjustment cannot be zero".to_string()));
        }
        let repo = self.products_repo();

        let optimistic = self
            .cache
            .product(id)
            .await
            .and_then(|mut p| {
                let next = p.stock.checked_add(delta).filter(|s| *s >= 0)?;
                set_stock_on(&mut p, next);
                Some(p)
            })
            .map(|p| CacheValue::Product(Box::new(p)));

        self.cache
            .mutate(CacheKey::Product(id), optimistic, async {
                repo.adjust_stock(id, delta).await.map_err(AppError::from)
            })
            .await
    }
}

fn set_stock_on(product: &mut Product, stock: i32) {
    product.stock = stock;
    product.stock_level = StockLevel::from_stock(stock);
}

/// Product writes only conflict on the category foreign key.
fn unknown_category(e: crate::db::RepositoryError) -> AppError {
    match e {
        crate::db::RepositoryError::Conflict(msg) => AppError::BadRequest(msg),
        other => AppError::Database(other),
    }
}

fn normalize_name(name: &str, what: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(format!("{what} name is required")));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "{what} name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

fn normalize_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn normalize_category(fields: CategoryFields) -> Result<CategoryFields> {
    Ok(CategoryFields {
        name: normalize_name(&fields.name, "Category")?,
        description: normalize_text(fields.description),
    })
}

fn normalize_product(fields: ProductFields) -> Result<ProductFields> {
    if fields.price.is_sign_negative() {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }
    if fields.price.scale() > 2 && fields.price != fields.price.round_dp(2) {
        return Err(AppError::BadRequest(
            "Price must have at most two decimal places".to_string(),
        ));
    }
    if fields.price >= Decimal::from(100_000_000) {
        return Err(AppError::BadRequest("Price is too large".to_string()));
    }
    if fields.stock < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".to_string()));
    }

    Ok(ProductFields {
        name: normalize_name(&fields.name, "Product")?,
        description: normalize_text(fields.description),
        price: fields.price.round_dp(2),
        stock: fields.stock,
        category_id: fields.category_id,
        image: normalize_text(fields.image),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fields(price: &str, stock: i32) -> ProductFields {
        ProductFields {
            name: "  Milo Dinosaur ".to_string(),
            description: Some("   ".to_string()),
            price: price.parse().unwrap(),
            stock,
            category_id: CategoryId::new(1),
            image: None,
        }
    }

    #[test]
    fn test_normalize_product_trims_and_rounds() {
        let f = normalize_product(fields("2.50", 4)).unwrap();
        assert_eq!(f.name, "Milo Dinosaur");
        assert_eq!(f.description, None);
        assert_eq!(f.price, "2.50".parse::<Decimal>().unwrap());

        // Trailing zeros beyond cents are fine
        assert!(normalize_product(fields("2.5000", 4)).is_ok());
    }

    #[test]
    fn test_normalize_product_rejects_bad_values() {
        assert!(normalize_product(fields("-0.01", 1)).is_err());
        assert!(normalize_product(fields("1.005", 1)).is_err());
        assert!(normalize_product(fields("1.00", -1)).is_err());

        let mut blank = fields("1.00", 1);
        blank.name = "   ".to_string();
        assert!(matches!(normalize_product(blank), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_normalize_category() {
        let f = normalize_category(CategoryFields {
            name: " Drinks ".to_string(),
            description: Some(" Cold and hot ".to_string()),
        })
        .unwrap();
        assert_eq!(f.name, "Drinks");
        assert_eq!(f.description.as_deref(), Some("Cold and hot"));
    }
}
