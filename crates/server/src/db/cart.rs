//! Cart repository.
//!
//! Only `(user, product, quantity)` is stored. Price and stock are joined in
//! from `shop.products` on every read so the cart always reflects the
//! current catalog.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use etuckshop_core::cart::MAX_LINE_QUANTITY;
use etuckshop_core::{CartLine, ProductId, StockLevel, UserId};

use super::RepositoryError;
use crate::models::CartItemView;

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    name: String,
    image: Option<String>,
    price: Decimal,
    stock: i32,
    quantity: i32,
}

impl From<CartItemRow> for CartItemView {
    fn from(r: CartItemRow) -> Self {
        let line = CartLine {
            product_id: r.product_id,
            quantity: r.quantity,
            unit_price: r.price,
            stock: r.stock,
        };

        Self {
            product_id: r.product_id,
            name: r.name,
            image: r.image,
            price: r.price,
            stock: r.stock,
            stock_level: StockLevel::from_stock(r.stock),
            quantity: r.quantity,
            subtotal: line.subtotal(),
            warning: line.warning(),
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read the user's cart lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, user_id: UserId) -> Result<Vec<CartItemView>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, user_id).await
    }

    /// Quantity of `product_id` already in the user's cart (0 if absent).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<i32, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT quantity FROM shop.cart_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map_or(0, |(q,)| q))
    }

    /// Insert or overwrite a line with an absolute quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn upsert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        Ok(())
    }

    /// Add `quantity` units to a line in one statement.
    ///
    /// The conflicting row is locked by the upsert, so concurrent adds stack
    /// instead of overwriting each other. Returns the new line quantity, or
    /// `None` if the result would exceed the product's stock or
    /// [`MAX_LINE_QUANTITY`] (or the product doesn't exist).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r"
            INSERT INTO shop.cart_items AS ci (user_id, product_id, quantity)
            SELECT $1, p.id, $3
            FROM shop.products p
            WHERE p.id = $2 AND $3 <= LEAST(p.stock, $4)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = ci.quantity + EXCLUDED.quantity, updated_at = NOW()
            WHERE ci.quantity + EXCLUDED.quantity
                <= LEAST((SELECT stock FROM shop.products WHERE id = $2), $4)
            RETURNING quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(q,)| q))
    }

    /// Remove one line. Returns `false` if it wasn't in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Empty the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear(&mut conn, user_id).await
    }
}

/// Read cart lines on an existing connection or transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<CartItemView>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT ci.product_id, p.name, p.image, p.price, p.stock, ci.quantity
        FROM shop.cart_items ci
        JOIN shop.products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.added_at, ci.product_id
        ",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(CartItemView::from).collect())
}

/// Empty a cart on an existing connection or transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear(conn: &mut PgConnection, user_id: UserId) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM shop.cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
