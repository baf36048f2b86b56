//! The signed-in user's wishlist.

use std::collections::HashSet;
use std::sync::Arc;

use marigold_core::{ProductId, UserId};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::api::{ApiError, CommerceApi, Product};
use crate::cache::{CacheKey, CacheValue, QueryCache};

/// Wishlist for one user.
///
/// The remote service identifies the owner from the bearer token; the user
/// id only scopes the cache entry.
#[derive(Clone)]
pub struct Wishlist {
    api: Arc<dyn CommerceApi>,
    cache: QueryCache,
    user: UserId,
    listed: Arc<RwLock<HashSet<ProductId>>>,
}

impl Wishlist {
    #[must_use]
    pub fn new(api: Arc<dyn CommerceApi>, cache: QueryCache, user: UserId) -> Self {
        Self {
            api,
            cache,
            user,
            listed: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    #[must_use]
    pub const fn user(&self) -> UserId {
        self.user
    }

    fn key(&self) -> CacheKey {
        CacheKey::Wishlist(self.user)
    }

    /// Products on the wishlist.
    ///
    /// # Errors
    ///
    /// Returns the service error when the list is not cached.
    #[instrument(skip(self), fields(user = %self.user))]
    pub async fn list(&self) -> Result<Vec<Product>, ApiError> {
        let products = match self.cache.get(&self.key()).await {
            Some(CacheValue::Wishlist(products)) => products,
            _ => {
                let products = self.api.wishlist().await?;
                self.cache
                    .insert(self.key(), CacheValue::Wishlist(products.clone()))
                    .await;
                products
            }
        };

        *self.listed.write().await = products.iter().map(|p| p.product_id).collect();
        Ok(products)
    }

    /// Whether `product` was on the wishlist when it was last listed.
    pub async fn contains(&self, product: ProductId) -> bool {
        self.listed.read().await.contains(&product)
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns the service error; nothing is invalidated on failure.
    #[instrument(skip(self), fields(user = %self.user, product = %product))]
    pub async fn add(&self, product: ProductId) -> Result<(), ApiError> {
        self.api.add_to_wishlist(product).await?;
        self.listed.write().await.insert(product);
        self.cache.invalidate(&self.key()).await;
        Ok(())
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns the service error; nothing is invalidated on failure.
    #[instrument(skip(self), fields(user = %self.user, product = %product))]
    pub async fn remove(&self, product: ProductId) -> Result<(), ApiError> {
        self.api.remove_from_wishlist(product).await?;
        self.listed.write().await.remove(&product);
        self.cache.invalidate(&self.key()).await;
        Ok(())
    }

    /// Add the product if absent, remove it if present. Returns whether it is now listed.
    ///
    /// Presence is read from the (cached) list, not from what this handle
    /// happened to see, so any handle for the user toggles the same way.
    ///
    /// # Errors
    ///
    /// Returns the service error.
    pub async fn toggle(&self, product: ProductId) -> Result<bool, ApiError> {
        let listed = self.list().await?;
        if listed.iter().any(|p| p.product_id == product) {
            self.remove(product).await?;
            Ok(false)
        } else {
            self.add(product).await?;
            Ok(true)
        }
    }
}
