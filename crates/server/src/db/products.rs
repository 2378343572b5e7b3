//! Product repository.
//!
//! Stock is only ever changed through single-statement updates or inside a
//! transaction holding the product row lock, so concurrent checkouts and
//! inventory edits cannot oversell.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use etuckshop_core::{CategoryId, ProductId, StockLevel};

use super::RepositoryError;
use crate::models::{CategorySummary, Product};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    category_id: CategoryId,
    category_name: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
            stock_level: StockLevel::from_stock(r.stock),
            category_id: r.category_id,
            category: CategorySummary {
                id: r.category_id,
                name: r.category_name,
            },
            image: r.image,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Filters for the public product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
    /// Only products with stock left.
    pub in_stock: bool,
}

impl ProductFilter {
    /// Returns `true` when no filter narrows the listing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category_id.is_none() && self.search.is_none() && !self.in_stock
    }
}

/// Fields accepted when creating or updating a product.
#[derive(Debug, Clone)]
pub struct ProductFields {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: CategoryId,
    pub image: Option<String>,
}

/// Stock and price of a locked product row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.description, p.price, p.stock, p.category_id,
                   c.name AS category_name, p.image, p.created_at, p.updated_at
            FROM shop.products p
            JOIN shop.categories c ON c.id = p.category_id
            WHERE ($1::INTEGER IS NULL OR p.category_id = $1)
              AND ($2::TEXT IS NULL
                   OR strpos(lower(p.name), lower($2)) > 0
                   OR strpos(lower(coalesce(p.description, '')), lower($2)) > 0)
              AND (NOT $3 OR p.stock > 0)
            ORDER BY p.name, p.id
            ",
        )
        .bind(filter.category_id)
        .bind(filter.search.as_deref())
        .bind(filter.in_stock)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// List products whose stock falls in `level`, or all products, lowest
    /// stock first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_inventory(
        &self,
        level: Option<StockLevel>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let (min, max) = level.map_or((None, None), |l| {
            let (min, max) = l.bounds();
            (Some(min), max)
        });

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.description, p.price, p.stock, p.category_id,
                   c.name AS category_name, p.image, p.created_at, p.updated_at
            FROM shop.products p
            JOIN shop.categories c ON c.id = p.category_id
            WHERE ($1::INTEGER IS NULL OR p.stock >= $1)
              AND ($2::INTEGER IS NULL OR p.stock <= $2)
            ORDER BY p.stock, p.name
            ",
        )
        .bind(min)
        .bind(max)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.description, p.price, p.stock, p.category_id,
                   c.name AS category_name, p.image, p.created_at, p.updated_at
            FROM shop.products p
            JOIN shop.categories c ON c.id = p.category_id
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Find a product by exact name within a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_name(
        &self,
        category_id: CategoryId,
        name: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.description, p.price, p.stock, p.category_id,
                   c.name AS category_name, p.image, p.created_at, p.updated_at
            FROM shop.products p
            JOIN shop.categories c ON c.id = p.category_id
            WHERE p.category_id = $1 AND p.name = $2
            ORDER BY p.id
            LIMIT 1
            ",
        )
        .bind(category_id)
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category doesn't exist.
    pub async fn create(&self, fields: &ProductFields) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            WITH p AS (
                INSERT INTO shop.products (name, description, price, stock, category_id, image)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT p.id, p.name, p.description, p.price, p.stock, p.category_id,
                   c.name AS category_name, p.image, p.created_at, p.updated_at
            FROM p
            JOIN shop.categories c ON c.id = p.category_id
            ",
        )
        .bind(&fields.name)
        .bind(fields.description.as_deref())
        .bind(fields.price)
        .bind(fields.stock)
        .bind(fields.category_id)
        .bind(fields.image.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category does not exist"))?;

        Ok(row.into())
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist and
    /// `RepositoryError::Conflict` if the category doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            WITH p AS (
                UPDATE shop.products
                SET name = $2, description = $3, price = $4, stock = $5,
                    category_id = $6, image = $7, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT p.id, p.name, p.description, p.price, p.stock, p.category_id,
                   c.name AS category_name, p.image, p.created_at, p.updated_at
            FROM p
            JOIN shop.categories c ON c.id = p.category_id
            ",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(fields.description.as_deref())
        .bind(fields.price)
        .bind(fields.stock)
        .bind(fields.category_id)
        .bind(fields.image.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category does not exist"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product that no order refers to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if order items reference the
    /// product and `RepositoryError::NotFound` if it doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, "product is referenced by existing orders")
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set a product's stock to an absolute value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError> {
        let updated: Option<(ProductId,)> = sqlx::query_as(
            "UPDATE shop.products SET stock = $2, updated_at = NOW() WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(stock)
        .fetch_optional(self.pool)
        .await?;

        if updated.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Add `delta` (possibly negative) to a product's stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist and
    /// `RepositoryError::Conflict` if the result would fall below zero.
    pub async fn adjust_stock(
        &self,
        id: ProductId,
        delta: i32,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(i32,)> =
            sqlx::query_as("SELECT stock FROM shop.products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (stock,) = current.ok_or(RepositoryError::NotFound)?;

        let next = stock
            .checked_add(delta)
            .filter(|s| *s >= 0)
            .ok_or_else(|| {
                RepositoryError::Conflict(format!(
                    "adjusting stock of {stock} by {delta} would go below zero"
                ))
            })?;

        sqlx::query("UPDATE shop.products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Lock `ids` with `FOR UPDATE`, in id order.
///
/// Locking in a fixed order keeps two checkouts over the same products from
/// deadlocking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_update(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<LockedProduct>, RepositoryError> {
    let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

    let rows = sqlx::query_as::<_, LockedProduct>(
        r"
        SELECT id, name, price, stock
        FROM shop.products
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(&raw)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Add `delta` to one product's stock inside a transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails, including when
/// the stock check constraint is violated.
pub async fn add_stock(
    conn: &mut PgConnection,
    id: ProductId,
    delta: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(delta)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_is_empty() {
        assert!(ProductFilter::default().is_empty());
        assert!(
            !ProductFilter {
                in_stock: true,
                ..ProductFilter::default()
            }
            .is_empty()
        );
        assert!(
            !ProductFilter {
                search: Some("chips".to_string()),
                ..ProductFilter::default()
            }
            .is_empty()
        );
    }
}
