//! Checkout and order status changes.
//!
//! Every status change runs in one transaction: lock the order row, ask the
//! state machine, write the guarded transition, then apply side effects
//! (stock restore, QR retirement) before committing.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use etuckshop_core::cart::validate_for_checkout;
use etuckshop_core::order::apply;
use etuckshop_core::{
    CartError, CartLine, CartTotals, OrderId, OrderNumber, OrderStatus, OrderTransition,
    PaymentType, ProductId, QrStatus, UserId,
};

use crate::cache::CatalogCache;
use crate::db::orders::{self, NewOrderItem, OrderFilter, OrderHead, OrderRepository};
use crate::db::{RepositoryError, cart, payment_qr, products};
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, Order};

/// Attempts at drawing an unused order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    catalog: &'a CatalogCache,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, catalog: &'a CatalogCache) -> Self {
        Self { pool, catalog }
    }

    const fn repo(&self) -> OrderRepository<'a> {
        OrderRepository::new(self.pool)
    }

    /// Turn the user's cart into a pending order.
    ///
    /// Products are locked for the whole transaction, so stock checked here
    /// is the stock decremented here.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cart` for an empty cart or lines that stock can't
    /// cover.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn checkout(&self, user_id: UserId, payment_type: PaymentType) -> Result<Order> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let items = cart::items(&mut tx, user_id).await?;
        if items.is_empty() {
            return Err(CartError::Empty.into());
        }

        let ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
        let locked: HashMap<ProductId, products::LockedProduct> =
            products::lock_for_update(&mut tx, &ids)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();

        // Re-read price and stock under the lock
        let lines: Vec<CartLine> = items
            .iter()
            .map(|item| {
                let product = locked.get(&item.product_id);
                CartLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: product.map_or(item.price, |p| p.price),
                    stock: product.map_or(0, |p| p.stock),
                }
            })
            .collect();
        validate_for_checkout(&lines)?;

        let total = CartTotals::from_lines(&lines).total_amount;
        let order_id = insert_with_fresh_number(&mut tx, user_id, payment_type, total).await?;

        let new_items: Vec<NewOrderItem> = lines
            .iter()
            .filter_map(|line| {
                locked.get(&line.product_id).map(|p| NewOrderItem {
                    product_id: p.id,
                    product_name: p.name.clone(),
                    unit_price: p.price,
                    quantity: line.quantity,
                })
            })
            .collect();
        orders::insert_items(&mut tx, order_id, &new_items).await?;

        for line in &lines {
            products::add_stock(&mut tx, line.product_id, -line.quantity).await?;
        }
        cart::clear(&mut tx, user_id).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        self.catalog.stock_changed(&ids).await;

        info!(order_id = %order_id, total = %total, "Order placed");
        self.load(order_id).await
    }

    /// The user's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_mine(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.repo().list_for_user(user_id).await?)
    }

    /// Every order matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        Ok(self.repo().list(filter).await?)
    }

    /// One order, visible to its owner and to admins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order doesn't exist or belongs to
    /// another customer.
    pub async fn get_for(&self, user: &CurrentUser, id: OrderId) -> Result<Order> {
        let order = self.load(id).await?;
        if order.user_id != user.id && !user.is_admin() {
            return Err(order_not_found(id));
        }
        Ok(order)
    }

    /// Customer cancels their own order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for someone else's order and a
    /// transition error once the order is terminal.
    #[instrument(skip(self, user), fields(user_id = %user.id, order_id = %id))]
    pub async fn cancel(&self, user: &CurrentUser, id: OrderId) -> Result<Order> {
        self.run(id, OrderTransition::Cancel, |head| {
            if head.user_id == user.id {
                Ok(())
            } else {
                Err(AppError::Forbidden(
                    "You can only cancel your own orders".to_string(),
                ))
            }
        })
        .await
    }

    /// Admin completes an order at pickup.
    ///
    /// # Errors
    ///
    /// Returns a transition error unless the order is `PAID`, or a `PENDING`
    /// cash order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn complete(&self, id: OrderId) -> Result<Order> {
        self.run(id, OrderTransition::Complete, |_| Ok(())).await
    }

    /// Admin rejects an open order.
    ///
    /// # Errors
    ///
    /// Returns a transition error once the order is terminal.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn reject(&self, id: OrderId) -> Result<Order> {
        self.run(id, OrderTransition::Reject, |_| Ok(())).await
    }

    async fn run<F>(&self, id: OrderId, event: OrderTransition, authorize: F) -> Result<Order>
    where
        F: FnOnce(&OrderHead) -> Result<()>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let head = orders::lock_head(&mut tx, id)
            .await?
            .ok_or_else(|| order_not_found(id))?;
        authorize(&head)?;

        let restored = transition_locked(&mut tx, head, event).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        if !restored.is_empty() {
            self.catalog.stock_changed(&restored).await;
        }

        self.load(id).await
    }

    async fn load(&self, id: OrderId) -> Result<Order> {
        self.repo().get(id).await?.ok_or_else(|| order_not_found(id))
    }
}

/// Apply `event` to a locked order and its side effects.
///
/// Returns the products whose stock was restored.
///
/// # Errors
///
/// Returns `AppError::Transition` if the state machine refuses the event and
/// a conflict if the row moved underneath the lock holder.
pub(crate) async fn transition_locked(
    conn: &mut PgConnection,
    head: OrderHead,
    event: OrderTransition,
) -> Result<Vec<ProductId>> {
    let next = apply(head.status, head.payment_type, event)?;
    orders::transition(conn, head.id, head.status, next).await?;

    let mut restored = Vec::new();
    if next == OrderStatus::Cancelled {
        let quantities = orders::item_quantities(conn, head.id).await?;
        let ids: Vec<ProductId> = quantities.iter().map(|(id, _)| *id).collect();

        // Lock in id order, same as checkout
        products::lock_for_update(conn, &ids).await?;
        for (product_id, quantity) in quantities {
            products::add_stock(conn, product_id, quantity).await?;
        }
        restored = ids;
    }

    // Leaving PENDING retires the QR: consumed on success, void on cancel
    let qr_status = if next == OrderStatus::Cancelled {
        QrStatus::Expired
    } else {
        QrStatus::Used
    };
    payment_qr::resolve_active(conn, head.id, qr_status).await?;

    info!(order_id = %head.id, from = %head.status, to = %next, %event, "Order transitioned");
    Ok(restored)
}

async fn insert_with_fresh_number(
    conn: &mut PgConnection,
    user_id: UserId,
    payment_type: PaymentType,
    total: Decimal,
) -> Result<OrderId> {
    let today = Utc::now().date_naive();

    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let number = OrderNumber::generate(today, &mut rand::rng());
        if let Some(id) = orders::insert(conn, user_id, &number, payment_type, total).await? {
            return Ok(id);
        }
        tracing::warn!(order_number = %number, "Order number collision, retrying");
    }

    Err(AppError::Internal(
        "could not allocate an order number".to_string(),
    ))
}

fn order_not_found(id: OrderId) -> AppError {
    AppError::NotFound(format!("Order {id} not found"))
}
