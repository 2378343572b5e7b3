//! In-memory catalog cache with optimistic mutations.
//!
//! Reads of products and categories are cached with `moka` for 5 minutes.
//! Every back-office write goes through [`CatalogCache::mutate`]:
//!
//! 1. Snapshot the current cached value for the key, unless another mutation
//!    of the same key is already in flight. Overlapping mutations share the
//!    first one's snapshot, since later reads only see optimistic values.
//! 2. Write the optimistic value (or drop the key for deletes).
//! 3. Run the database operation.
//! 4. When the last overlapping mutation settles, put the shared snapshot
//!    back if none of them succeeded. Otherwise, and whenever a mutation
//!    settles while others are still running, drop the key so the next read
//!    comes from the database.
//! 5. Either way, drop the list entries for the resource.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;
use tracing::warn;

use etuckshop_core::{CategoryId, ProductId};

use crate::models::{Category, CategoryDetail, Product};

/// Default time-to-live for cached catalog reads.
pub const CATALOG_TTL: Duration = Duration::from_secs(300);

/// Cache key for products and categories.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    /// Unfiltered product listing.
    Products,
    Category(CategoryId),
    Categories,
}

impl CacheKey {
    const fn is_product_side(self) -> bool {
        matches!(self, Self::Product(_) | Self::Products)
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Arc<Vec<Product>>),
    Category(Box<CategoryDetail>),
    Categories(Arc<Vec<Category>>),
}

/// Overlapping mutations of one key.
struct InFlight {
    /// Mutations that have started and not yet settled.
    pending: usize,
    /// Cached value from before the first of them started.
    snapshot: Option<CacheValue>,
    /// Whether any of them reached the database.
    committed: bool,
}

/// Shared catalog cache. Cheap to clone.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
    in_flight: Arc<Mutex<HashMap<CacheKey, InFlight>>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(CATALOG_TTL)
    }
}

impl CatalogCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();

        Self {
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Look up a raw entry.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.cache.get(key).await
    }

    /// Store a raw entry.
    pub async fn insert(&self, key: CacheKey, value: CacheValue) {
        self.cache.insert(key, value).await;
    }

    /// Drop one entry.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Cached product detail.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        match self.get(&CacheKey::Product(id)).await {
            Some(CacheValue::Product(product)) => Some(*product),
            _ => None,
        }
    }

    /// Cached unfiltered product list.
    pub async fn products(&self) -> Option<Arc<Vec<Product>>> {
        match self.get(&CacheKey::Products).await {
            Some(CacheValue::Products(products)) => Some(products),
            _ => None,
        }
    }

    /// Cached category detail.
    pub async fn category(&self, id: CategoryId) -> Option<CategoryDetail> {
        match self.get(&CacheKey::Category(id)).await {
            Some(CacheValue::Category(detail)) => Some(*detail),
            _ => None,
        }
    }

    /// Cached category list.
    pub async fn categories(&self) -> Option<Arc<Vec<Category>>> {
        match self.get(&CacheKey::Categories).await {
            Some(CacheValue::Categories(categories)) => Some(categories),
            _ => None,
        }
    }

    /// Run `op` with `optimistic` visible under `key` until it settles.
    ///
    /// `optimistic = None` hides the key for the duration (deletes). See the
    /// module docs for the full sequence.
    ///
    /// # Errors
    ///
    /// Returns whatever `op` returns, after rolling the key back.
    pub async fn mutate<T, E, F>(
        &self,
        key: CacheKey,
        optimistic: Option<CacheValue>,
        op: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(entry) = in_flight.get_mut(&key) {
                entry.pending += 1;
            } else {
                let snapshot = self.cache.get(&key).await;
                in_flight.insert(
                    key,
                    InFlight {
                        pending: 1,
                        snapshot,
                        committed: false,
                    },
                );
            }

            match optimistic {
                Some(value) => self.cache.insert(key, value).await,
                None => self.cache.invalidate(&key).await,
            }
        }

        let result = op.await;

        {
            let mut in_flight = self.in_flight.lock().await;
            let last = match in_flight.get_mut(&key) {
                Some(entry) => {
                    entry.pending = entry.pending.saturating_sub(1);
                    entry.committed |= result.is_ok();
                    entry.pending == 0
                }
                None => true,
            };

            if last {
                let restore = in_flight
                    .remove(&key)
                    .filter(|entry| !entry.committed)
                    .and_then(|entry| entry.snapshot);

                match restore {
                    Some(previous) => self.cache.insert(key, previous).await,
                    None => self.cache.invalidate(&key).await,
                }
            } else {
                self.cache.invalidate(&key).await;
            }
        }

        self.invalidate_lists(key).await;

        result
    }

    /// Drop entries for products whose stock moved outside the back-office
    /// (checkout, cancellation, rejection).
    pub async fn stock_changed(&self, ids: &[ProductId]) {
        for id in ids {
            self.cache.invalidate(&CacheKey::Product(*id)).await;
        }
        self.invalidate_lists(CacheKey::Products).await;
    }

    /// Drop list entries, and details embedding data from `key`'s resource.
    async fn invalidate_lists(&self, key: CacheKey) {
        self.cache.invalidate(&CacheKey::Products).await;
        self.cache.invalidate(&CacheKey::Categories).await;

        // Category details embed products; product details embed the
        // category name
        let predicate = if key.is_product_side() {
            self.cache
                .invalidate_entries_if(|k, _| matches!(k, CacheKey::Category(_)))
        } else {
            self.cache
                .invalidate_entries_if(|k, _| matches!(k, CacheKey::Product(_)))
        };

        if let Err(e) = predicate {
            warn!(error = %e, "Failed to register cache invalidation predicate");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use etuckshop_core::StockLevel;

    use super::*;
    use crate::models::CategorySummary;

    fn product(id: i32, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: None,
            price: Decimal::new(150, 2),
            stock,
            stock_level: StockLevel::from_stock(stock),
            category_id: CategoryId::new(1),
            category: CategorySummary {
                id: CategoryId::new(1),
                name: "Snacks".to_string(),
            },
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn value(p: &Product) -> CacheValue {
        CacheValue::Product(Box::new(p.clone()))
    }

    #[tokio::test]
    async fn test_optimistic_value_visible_while_op_runs() {
        let cache = CatalogCache::default();
        let key = CacheKey::Product(ProductId::new(1));
        cache.insert(key, value(&product(1, 5))).await;

        let observer = cache.clone();
        let seen = cache
            .mutate(key, Some(value(&product(1, 9))), async move {
                Ok::<_, ()>(observer.product(ProductId::new(1)).await)
            })
            .await
            .unwrap();

        assert_eq!(seen.map(|p| p.stock), Some(9));
    }

    #[tokio::test]
    async fn test_success_drops_key_and_lists() {
        let cache = CatalogCache::default();
        let key = CacheKey::Product(ProductId::new(1));
        cache.insert(key, value(&product(1, 5))).await;
        cache
            .insert(
                CacheKey::Products,
                CacheValue::Products(Arc::new(vec![product(1, 5)])),
            )
            .await;

        let result: Result<u8, ()> = cache
            .mutate(key, Some(value(&product(1, 9))), async { Ok(1) })
            .await;

        assert_eq!(result, Ok(1));
        assert!(cache.product(ProductId::new(1)).await.is_none());
        assert!(cache.products().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_restores_snapshot() {
        let cache = CatalogCache::default();
        let key = CacheKey::Product(ProductId::new(1));
        cache.insert(key, value(&product(1, 5))).await;

        let result: Result<(), &str> = cache
            .mutate(key, Some(value(&product(1, 9))), async { Err("constraint") })
            .await;

        assert_eq!(result, Err("constraint"));
        assert_eq!(cache.product(ProductId::new(1)).await.map(|p| p.stock), Some(5));
    }

    #[tokio::test]
    async fn test_failure_without_snapshot_leaves_key_empty() {
        let cache = CatalogCache::default();
        let key = CacheKey::Product(ProductId::new(2));

        let result: Result<(), &str> = cache
            .mutate(key, Some(value(&product(2, 1))), async { Err("gone") })
            .await;

        assert!(result.is_err());
        assert!(cache.product(ProductId::new(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_overlapping_failures_restore_committed_value() {
        let cache = CatalogCache::default();
        let key = CacheKey::Product(ProductId::new(4));
        cache.insert(key, value(&product(4, 5))).await;

        let (a_started_tx, a_started) = tokio::sync::oneshot::channel::<()>();
        let (release_a_tx, release_a) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .mutate(key, Some(value(&product(4, 9))), async move {
                        a_started_tx.send(()).unwrap();
                        release_a.await.unwrap();
                        Err::<(), _>("first")
                    })
                    .await
            })
        };
        a_started.await.unwrap();

        // Starts while the first write is still running, so the cache holds
        // its optimistic value
        let second = cache
            .mutate(key, Some(value(&product(4, 7))), async {
                release_a_tx.send(()).unwrap();
                tokio::task::yield_now().await;
                Err::<(), _>("second")
            })
            .await;

        assert_eq!(first.await.unwrap(), Err("first"));
        assert_eq!(second, Err("second"));
        assert_eq!(cache.product(ProductId::new(4)).await.map(|p| p.stock), Some(5));
    }

    #[tokio::test]
    async fn test_overlapping_success_drops_key() {
        let cache = CatalogCache::default();
        let key = CacheKey::Product(ProductId::new(5));
        cache.insert(key, value(&product(5, 5))).await;

        let (release_tx, release) = tokio::sync::oneshot::channel::<()>();
        let first = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .mutate(key, Some(value(&product(5, 9))), async move {
                        release.await.unwrap();
                        Err::<(), _>("first")
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let second: Result<(), &str> = cache
            .mutate(key, Some(value(&product(5, 7))), async { Ok(()) })
            .await;
        release_tx.send(()).unwrap();

        assert_eq!(second, Ok(()));
        assert_eq!(first.await.unwrap(), Err("first"));
        // The committed value is only known to the database
        assert!(cache.product(ProductId::new(5)).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_hides_key_then_restores_on_failure() {
        let cache = CatalogCache::default();
        let key = CacheKey::Product(ProductId::new(3));
        cache.insert(key, value(&product(3, 2))).await;

        let observer = cache.clone();
        let result: Result<(), bool> = cache
            .mutate(key, None, async move {
                Err(observer.product(ProductId::new(3)).await.is_none())
            })
            .await;

        // Hidden during the op, back afterwards
        assert_eq!(result, Err(true));
        assert!(cache.product(ProductId::new(3)).await.is_some());
    }
}
