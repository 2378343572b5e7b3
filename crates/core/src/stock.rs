//! Derived stock levels.

use serde::{Deserialize, Serialize};

/// Highest stock count still considered `LOW`.
pub const LOW_STOCK_MAX: i32 = 10;
/// Highest stock count still considered `MEDIUM`.
pub const MEDIUM_STOCK_MAX: i32 = 50;

/// Coarse stock bucket shown next to products and used by inventory filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockLevel {
    /// Nothing left.
    OutOfStock,
    /// 1 to [`LOW_STOCK_MAX`] units.
    Low,
    /// Up to [`MEDIUM_STOCK_MAX`] units.
    Medium,
    /// More than [`MEDIUM_STOCK_MAX`] units.
    High,
}

impl StockLevel {
    /// Bucket a raw stock count. Negative counts are treated as empty.
    #[must_use]
    pub const fn from_stock(stock: i32) -> Self {
        if stock <= 0 {
            Self::OutOfStock
        } else if stock <= LOW_STOCK_MAX {
            Self::Low
        } else if stock <= MEDIUM_STOCK_MAX {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Inclusive stock range for this level, as `(min, max)`.
    ///
    /// `max` is `None` for [`StockLevel::High`]. Used to push inventory
    /// filters down into SQL.
    #[must_use]
    pub const fn bounds(self) -> (i32, Option<i32>) {
        match self {
            Self::OutOfStock => (i32::MIN, Some(0)),
            Self::Low => (1, Some(LOW_STOCK_MAX)),
            Self::Medium => (LOW_STOCK_MAX + 1, Some(MEDIUM_STOCK_MAX)),
            Self::High => (MEDIUM_STOCK_MAX + 1, None),
        }
    }
}

impl std::str::FromStr for StockLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OUT_OF_STOCK" => Ok(Self::OutOfStock),
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(format!("invalid stock level: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(StockLevel::from_stock(-3), StockLevel::OutOfStock);
        assert_eq!(StockLevel::from_stock(0), StockLevel::OutOfStock);
        assert_eq!(StockLevel::from_stock(1), StockLevel::Low);
        assert_eq!(StockLevel::from_stock(10), StockLevel::Low);
        assert_eq!(StockLevel::from_stock(11), StockLevel::Medium);
        assert_eq!(StockLevel::from_stock(50), StockLevel::Medium);
        assert_eq!(StockLevel::from_stock(51), StockLevel::High);
    }

    #[test]
    fn test_bounds_contain_their_own_level() {
        for stock in [0, 1, 7, 10, 11, 30, 50, 51, 500] {
            let level = StockLevel::from_stock(stock);
            let (min, max) = level.bounds();
            assert!(stock >= min, "{stock} below {level:?}");
            assert!(max.is_none_or(|max| stock <= max), "{stock} above {level:?}");
        }
    }

    #[test]
    fn test_serialized_labels() {
        assert_eq!(
            serde_json::to_string(&StockLevel::OutOfStock).ok().as_deref(),
            Some("\"OUT_OF_STOCK\"")
        );
        assert_eq!("medium".parse::<StockLevel>(), Ok(StockLevel::Medium));
    }
}
