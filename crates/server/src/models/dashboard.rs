//! Back-office dashboard figures.

use rust_decimal::Decimal;
use serde::Serialize;

/// Order counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCounts {
    pub pending: i64,
    pub paid: i64,
    pub completed: i64,
    pub cancelled: i64,
}

impl OrderCounts {
    /// All orders ever placed.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.pending + self.paid + self.completed + self.cancelled
    }
}

/// Response for `GET /admin/dashboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub orders: OrderCounts,
    pub total_orders: i64,
    /// Revenue from completed orders.
    pub revenue: Decimal,
    /// Orders placed since local midnight (UTC).
    pub today_orders: i64,
    pub total_products: i64,
    pub low_stock_products: i64,
    pub out_of_stock_products: i64,
}
