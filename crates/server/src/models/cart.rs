//! Cart read projections.

use rust_decimal::Decimal;
use serde::Serialize;

use etuckshop_core::{CartLine, CartTotals, ProductId, StockLevel, StockWarning};

/// One cart line with price and stock read at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    /// Current unit price.
    pub price: Decimal,
    /// Current stock.
    pub stock: i32,
    pub stock_level: StockLevel,
    pub quantity: i32,
    pub subtotal: Decimal,
    /// Set when the line cannot be fulfilled as it stands.
    pub warning: Option<StockWarning>,
}

impl CartItemView {
    /// Core view of this line for totals and checkout validation.
    #[must_use]
    pub const fn line(&self) -> CartLine {
        CartLine {
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.price,
            stock: self.stock,
        }
    }
}

/// The whole cart, as returned by `GET /cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItemView>,
    #[serde(flatten)]
    pub totals: CartTotals,
}

impl CartView {
    /// Build the cart view, computing totals from `items`.
    #[must_use]
    pub fn new(items: Vec<CartItemView>) -> Self {
        let lines: Vec<CartLine> = items.iter().map(CartItemView::line).collect();
        let totals = CartTotals::from_lines(&lines);
        Self { items, totals }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: i32, quantity: i32, price: &str, stock: i32) -> CartItemView {
        let price: Decimal = price.parse().unwrap();
        let line = CartLine {
            product_id: ProductId::new(id),
            quantity,
            unit_price: price,
            stock,
        };
        CartItemView {
            product_id: line.product_id,
            name: format!("Item {id}"),
            image: None,
            price,
            stock,
            stock_level: StockLevel::from_stock(stock),
            quantity,
            subtotal: line.subtotal(),
            warning: line.warning(),
        }
    }

    #[test]
    fn test_cart_view_serializes_flat_totals() {
        let view = CartView::new(vec![item(1, 2, "1.50", 10), item(2, 4, "2.00", 3)]);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["totalItems"], 6);
        assert_eq!(json["totalAmount"], "11.00");
        assert_eq!(json["hasStockIssues"], true);
        assert_eq!(json["items"][1]["warning"]["kind"], "INSUFFICIENT_STOCK");
        assert_eq!(json["items"][1]["warning"]["available"], 3);
        assert!(json["items"][0]["warning"].is_null());
    }

    #[test]
    fn test_empty_cart() {
        let view = CartView::new(Vec::new());
        assert_eq!(view.totals.total_items, 0);
        assert_eq!(view.totals.total_amount, Decimal::ZERO);
        assert!(!view.totals.has_stock_issues);
    }
}
