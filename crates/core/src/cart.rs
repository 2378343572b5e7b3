//! Cart line validation and totals.
//!
//! Cart lines are read together with the product's *current* price and stock.
//! A line whose quantity exceeds stock is kept as-is and flagged with a
//! [`StockWarning`]; checkout refuses the cart until the customer fixes it.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::ProductId;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// A cart line joined with its product's current price and stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Product in the line.
    pub product_id: ProductId,
    /// Requested quantity.
    pub quantity: i32,
    /// Current unit price.
    pub unit_price: Decimal,
    /// Current stock.
    pub stock: i32,
}

/// Why a cart line cannot be fulfilled right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockWarning {
    /// The product has no stock at all.
    OutOfStock,
    /// Fewer units are available than requested.
    InsufficientStock {
        /// Units currently in stock.
        available: i32,
    },
}

impl std::fmt::Display for StockWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfStock => f.write_str("out of stock"),
            Self::InsufficientStock { available } => write!(f, "only {available} left"),
        }
    }
}

impl CartLine {
    /// Line subtotal at the current price.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Stock problem for this line, if any.
    #[must_use]
    pub const fn warning(&self) -> Option<StockWarning> {
        if self.stock <= 0 {
            Some(StockWarning::OutOfStock)
        } else if self.quantity > self.stock {
            Some(StockWarning::InsufficientStock {
                available: self.stock,
            })
        } else {
            None
        }
    }
}

/// Aggregate figures for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    /// Sum of line quantities.
    pub total_items: i64,
    /// Sum of line subtotals, rounded to cents.
    pub total_amount: Decimal,
    /// Whether any line carries a [`StockWarning`].
    pub has_stock_issues: bool,
}

impl CartTotals {
    /// Compute totals over `lines`.
    #[must_use]
    pub fn from_lines(lines: &[CartLine]) -> Self {
        let total_items = lines.iter().map(|l| i64::from(l.quantity)).sum();
        let total_amount = lines
            .iter()
            .map(CartLine::subtotal)
            .sum::<Decimal>()
            .round_dp(2);
        let has_stock_issues = lines.iter().any(|l| l.warning().is_some());

        Self {
            total_items,
            total_amount,
            has_stock_issues,
        }
    }
}

/// A cart change or checkout that breaks a cart rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// Quantity must be positive (or zero for an update meaning "remove").
    #[error("quantity must be between 1 and 99")]
    InvalidQuantity,

    /// The requested quantity exceeds what is in stock.
    #[error("only {available} in stock")]
    ExceedsStock {
        /// Units currently in stock.
        available: i32,
    },

    /// Checkout with nothing in the cart.
    #[error("cart is empty")]
    Empty,

    /// Checkout with lines that cannot be fulfilled.
    #[error("{} item(s) in the cart are unavailable", .0.len())]
    Unavailable(Vec<(ProductId, StockWarning)>),
}

/// Quantity a line will hold after adding `adding` units to `existing`.
///
/// # Errors
///
/// Returns [`CartError::InvalidQuantity`] for non-positive or oversized
/// quantities and [`CartError::ExceedsStock`] when stock cannot cover the new
/// line quantity.
pub fn quantity_after_add(existing: i32, adding: i32, stock: i32) -> Result<i32, CartError> {
    if adding <= 0 {
        return Err(CartError::InvalidQuantity);
    }
    let next = existing
        .checked_add(adding)
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or(CartError::InvalidQuantity)?;
    ensure_within_stock(next, stock)?;
    Ok(next)
}

/// Validate a quantity set directly by the customer. Zero means "remove".
///
/// # Errors
///
/// Same as [`quantity_after_add`].
pub fn validate_set_quantity(quantity: i32, stock: i32) -> Result<Option<i32>, CartError> {
    if quantity == 0 {
        return Ok(None);
    }
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(CartError::InvalidQuantity);
    }
    ensure_within_stock(quantity, stock)?;
    Ok(Some(quantity))
}

const fn ensure_within_stock(quantity: i32, stock: i32) -> Result<(), CartError> {
    if quantity > stock {
        return Err(CartError::ExceedsStock {
            available: if stock < 0 { 0 } else { stock },
        });
    }
    Ok(())
}

/// Check that every line can be fulfilled before turning a cart into an order.
///
/// # Errors
///
/// Returns [`CartError::Empty`] for an empty cart and
/// [`CartError::Unavailable`] listing every failing line otherwise.
pub fn validate_for_checkout(lines: &[CartLine]) -> Result<(), CartError> {
    if lines.is_empty() {
        return Err(CartError::Empty);
    }

    let problems: Vec<_> = lines
        .iter()
        .filter_map(|l| l.warning().map(|w| (l.product_id, w)))
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(CartError::Unavailable(problems))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(id: i32, quantity: i32, price: Decimal, stock: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
            unit_price: price,
            stock,
        }
    }

    #[test]
    fn test_totals() {
        let lines = [line(1, 2, dec("1.20"), 10), line(2, 3, dec("0.85"), 10)];
        let totals = CartTotals::from_lines(&lines);

        assert_eq!(totals.total_items, 5);
        assert_eq!(totals.total_amount, dec("4.95"));
        assert!(!totals.has_stock_issues);
    }

    #[test]
    fn test_warnings_are_reported_not_corrected() {
        let short = line(1, 5, dec("2.00"), 3);
        assert_eq!(
            short.warning(),
            Some(StockWarning::InsufficientStock { available: 3 })
        );
        // Quantity stays what the customer asked for
        assert_eq!(short.subtotal(), dec("10.00"));

        assert_eq!(
            line(2, 1, dec("2.00"), 0).warning(),
            Some(StockWarning::OutOfStock)
        );
        assert!(CartTotals::from_lines(&[short]).has_stock_issues);
    }

    #[test]
    fn test_quantity_after_add() {
        assert_eq!(quantity_after_add(0, 2, 5), Ok(2));
        assert_eq!(quantity_after_add(2, 3, 5), Ok(5));
        assert_eq!(
            quantity_after_add(2, 4, 5),
            Err(CartError::ExceedsStock { available: 5 })
        );
        assert_eq!(quantity_after_add(0, 0, 5), Err(CartError::InvalidQuantity));
        assert_eq!(
            quantity_after_add(98, 2, 1000),
            Err(CartError::InvalidQuantity)
        );
        assert_eq!(
            quantity_after_add(i32::MAX, 1, i32::MAX),
            Err(CartError::InvalidQuantity)
        );
    }

    #[test]
    fn test_validate_set_quantity() {
        assert_eq!(validate_set_quantity(0, 0), Ok(None));
        assert_eq!(validate_set_quantity(3, 3), Ok(Some(3)));
        assert_eq!(validate_set_quantity(-1, 3), Err(CartError::InvalidQuantity));
        assert_eq!(
            validate_set_quantity(4, -2),
            Err(CartError::ExceedsStock { available: 0 })
        );
    }

    #[test]
    fn test_validate_for_checkout() {
        assert_eq!(validate_for_checkout(&[]), Err(CartError::Empty));
        assert_eq!(
            validate_for_checkout(&[line(1, 1, dec("1.00"), 1)]),
            Ok(())
        );

        let err = validate_for_checkout(&[
            line(1, 1, dec("1.00"), 1),
            line(2, 2, dec("1.00"), 1),
            line(3, 1, dec("1.00"), 0),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            CartError::Unavailable(vec![
                (
                    ProductId::new(2),
                    StockWarning::InsufficientStock { available: 1 }
                ),
                (ProductId::new(3), StockWarning::OutOfStock),
            ])
        );
        assert_eq!(err.to_string(), "2 item(s) in the cart are unavailable");
    }
}
