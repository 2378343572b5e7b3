//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use etuckshop_core::CategoryId;

use super::RepositoryError;
use crate::models::Category;

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    description: Option<String>,
    product_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            product_count: r.product_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Fields accepted when creating or updating a category.
#[derive(Debug, Clone)]
pub struct CategoryFields {
    pub name: String,
    pub description: Option<String>,
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories by name, with product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT c.id, c.name, c.description, c.created_at, c.updated_at,
                   COUNT(p.id) AS product_count
            FROM shop.categories c
            LEFT JOIN shop.products p ON p.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get one category with its product count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT c.id, c.name, c.description, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM shop.products p WHERE p.category_id = c.id)
                       AS product_count
            FROM shop.categories c
            WHERE c.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, fields: &CategoryFields) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO shop.categories (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at, 0::BIGINT AS product_count
            ",
        )
        .bind(&fields.name)
        .bind(fields.description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category name already exists"))?;

        Ok(row.into())
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist and
    /// `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        fields: &CategoryFields,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            UPDATE shop.categories c
            SET name = $2, description = $3, updated_at = NOW()
            WHERE c.id = $1
            RETURNING c.id, c.name, c.description, c.created_at, c.updated_at,
                      (SELECT COUNT(*) FROM shop.products p WHERE p.category_id = c.id)
                          AS product_count
            ",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(fields.description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category name already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete an empty category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products remain in the
    /// category and `RepositoryError::NotFound` if it doesn't exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the category so no product can be filed under it meanwhile
        let exists: Option<(CategoryId,)> =
            sqlx::query_as("SELECT id FROM shop.categories WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let (product_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM shop.products WHERE category_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if product_count > 0 {
            return Err(RepositoryError::Conflict(format!(
                "category still has {product_count} product(s)"
            )));
        }

        sqlx::query("DELETE FROM shop.categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "category still has products"))?;

        tx.commit().await?;
        Ok(())
    }

    /// Find a category by exact name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT c.id, c.name, c.description, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM shop.products p WHERE p.category_id = c.id)
                       AS product_count
            FROM shop.categories c
            WHERE c.name = $1
            ",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }
}
