//! Process-wide query cache for remote reads.
//!
//! Entries are keyed by a typed `(resource, owner)` key and expire after the
//! configured TTL. Writes never go into the cache directly: a component that
//! mutates remote state calls [`QueryCache::invalidate`] so the next read
//! fetches fresh data. Only the cart gateway, the checkout pipeline and the
//! wishlist invalidate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use marigold_core::{Email, OrderId, OrderStatus, UserId};
use moka::future::Cache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::{Order, Product};
use crate::cart::CartLineItem;
use crate::config::ClientConfig;

/// Kind of cached resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Cart,
    Wishlist,
    LatestOrder,
    Order,
    Orders,
}

/// Cache key: resource type plus the identity that owns it.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Cart(UserId),
    Wishlist(UserId),
    LatestOrder(Email),
    Order(OrderId),
    Orders { email: Email, status: OrderStatus },
}

impl CacheKey {
    #[must_use]
    pub const fn resource(&self) -> Resource {
        match self {
            Self::Cart(_) => Resource::Cart,
            Self::Wishlist(_) => Resource::Wishlist,
            Self::LatestOrder(_) => Resource::LatestOrder,
            Self::Order(_) => Resource::Order,
            Self::Orders { .. } => Resource::Orders,
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Cart(Vec<CartLineItem>),
    Wishlist(Vec<Product>),
    Order(Box<Order>),
    Orders(Vec<Order>),
}

/// Shared query cache. Cloning shares the same underlying store.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

struct QueryCacheInner {
    entries: Cache<CacheKey, CacheValue>,
    invalidations: Mutex<HashMap<CacheKey, u64>>,
}

impl QueryCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(QueryCacheInner {
                entries,
                invalidations: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a cache sized from client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.cache_capacity, config.cache_ttl)
    }

    /// Cached value for `key`, if fresh.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let hit = self.inner.entries.get(key).await;
        if hit.is_some() {
            debug!(?key, "Cache hit");
        }
        hit
    }

    /// Store a freshly fetched value.
    pub async fn insert(&self, key: CacheKey, value: CacheValue) {
        self.inner.entries.insert(key, value).await;
    }

    /// Whether a fresh value is cached for `key`.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.inner.entries.get(key).await.is_some()
    }

    /// Mark `key` stale so the next read fetches from the remote service.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.inner.entries.invalidate(key).await;
        *self
            .inner
            .invalidations
            .lock()
            .await
            .entry(key.clone())
            .or_insert(0) += 1;
        debug!(?key, "Cache invalidated");
    }

    /// Invalidate every order listing for `email` (latest order and each status tab).
    pub async fn invalidate_orders(&self, email: &Email) {
        self.invalidate(&CacheKey::LatestOrder(email.clone())).await;
        for status in OrderStatus::ALL {
            self.invalidate(&CacheKey::Orders {
                email: email.clone(),
                status,
            })
            .await;
        }
    }

    /// How many times `key` has been invalidated since the cache was created.
    pub async fn invalidation_count(&self, key: &CacheKey) -> u64 {
        self.inner
            .invalidations
            .lock()
            .await
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}
