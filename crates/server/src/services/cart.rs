//! Cart operations.
//!
//! Quantities are checked against the product's current stock when the line
//! changes. Lines that later fall behind stock are kept and flagged; checkout
//! refuses them.

use sqlx::PgPool;
use tracing::instrument;

use etuckshop_core::cart::{quantity_after_add, validate_set_quantity};
use etuckshop_core::{ProductId, UserId};

use crate::db::cart::CartRepository;
use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::CartView;

/// Cart service.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// The user's cart with totals and stock warnings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn view(&self, user_id: UserId) -> Result<CartView> {
        Ok(CartView::new(self.carts.items(user_id).await?))
    }

    /// Add `quantity` units of a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown product,
    /// `AppError::Cart` if the line would exceed stock, and
    /// `AppError::Conflict` if a concurrent change made the add fail without
    /// leaving the line over the limit.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> Result<CartView> {
        let stock = self.stock_of(product_id).await?;
        let existing = self.carts.quantity(user_id, product_id).await?;
        quantity_after_add(existing, quantity, stock)?;

        if self.carts.add(user_id, product_id, quantity).await?.is_none() {
            // The line or the stock moved after the check above
            let stock = self.stock_of(product_id).await?;
            let existing = self.carts.quantity(user_id, product_id).await?;
            quantity_after_add(existing, quantity, stock)?;
            return Err(AppError::Conflict(
                "Cart changed while adding, please retry".to_owned(),
            ));
        }

        self.view(user_id).await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown product and
    /// `AppError::Cart` for an invalid quantity.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn update(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> Result<CartView> {
        let stock = self.stock_of(product_id).await?;

        match validate_set_quantity(quantity, stock)? {
            Some(quantity) => self.carts.upsert(user_id, product_id, quantity).await?,
            None => {
                self.carts.remove(user_id, product_id).await?;
            }
        }
        self.view(user_id).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product isn't in the cart.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<CartView> {
        if !self.carts.remove(user_id, product_id).await? {
            return Err(AppError::NotFound(format!(
                "Product {product_id} is not in the cart"
            )));
        }
        self.view(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<CartView> {
        self.carts.clear(user_id).await?;
        Ok(CartView::new(Vec::new()))
    }

    async fn stock_of(&self, product_id: ProductId) -> Result<i32> {
        self.products
            .get(product_id)
            .await?
            .map(|p| p.stock)
            .ok_or_else(|| AppError::NotFound(format!("Product {product_id} not found")))
    }
}
