//! Cart mutations against the remote service.
//!
//! Every successful mutation invalidates the user's cart cache entry exactly
//! once; a failed mutation invalidates nothing.

use std::sync::Arc;

use marigold_core::{CartItemId, UserId};
use tracing::{debug, instrument, warn};

use super::{CartError, CartLineItem, Confirmer, DestructiveAction, Quantity};
use crate::api::{AddToCartRequest, ApiError, CommerceApi};
use crate::cache::{CacheKey, CacheValue, QueryCache};

/// Result of a mutation that required confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The request succeeded and the cart cache was invalidated.
    Applied,
    /// The user declined; no request was made.
    Declined,
}

/// Issues cart reads and mutations and keeps the cart cache honest.
#[derive(Clone)]
pub struct CartGateway {
    api: Arc<dyn CommerceApi>,
    cache: QueryCache,
}

impl CartGateway {
    #[must_use]
    pub fn new(api: Arc<dyn CommerceApi>, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    #[must_use]
    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Read a user's cart, served from cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is not cached and the fetch fails.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn fetch_cart(&self, user: UserId) -> Result<Vec<CartLineItem>, ApiError> {
        let key = CacheKey::Cart(user);
        if let Some(CacheValue::Cart(items)) = self.cache.get(&key).await {
            return Ok(items);
        }

        let items = self.api.fetch_cart(user).await?;
        debug!(lines = items.len(), "Fetched cart");
        self.cache.insert(key, CacheValue::Cart(items.clone())).await;
        Ok(items)
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns the service error; the cache is left untouched on failure.
    #[instrument(skip(self), fields(user = %user, item = %item, quantity = %quantity))]
    pub async fn update_quantity(
        &self,
        user: UserId,
        item: CartItemId,
        quantity: Quantity,
    ) -> Result<Option<CartLineItem>, ApiError> {
        let line = self.api.update_quantity(item, quantity).await?;
        self.invalidate(user).await;
        Ok(line)
    }

    /// Delete a line after the user confirms.
    ///
    /// # Errors
    ///
    /// Returns the service error; the cache is left untouched on failure.
    #[instrument(skip(self, confirmer), fields(user = %user, item = %item))]
    pub async fn delete_item(
        &self,
        user: UserId,
        item: CartItemId,
        confirmer: &dyn Confirmer,
    ) -> Result<MutationOutcome, CartError> {
        if !confirmer.confirm(&DestructiveAction::DeleteItem(item)).await {
            debug!("Delete declined");
            return Ok(MutationOutcome::Declined);
        }

        self.api.delete_item(item).await.inspect_err(|e| {
            warn!(error = %e, "Failed to delete cart item");
        })?;
        self.invalidate(user).await;
        Ok(MutationOutcome::Applied)
    }

    /// Remove every line after the user confirms. Clearing an empty cart succeeds.
    ///
    /// # Errors
    ///
    /// Returns the service error; the cache is left untouched on failure.
    #[instrument(skip(self, confirmer), fields(user = %user))]
    pub async fn clear_cart(
        &self,
        user: UserId,
        confirmer: &dyn Confirmer,
    ) -> Result<MutationOutcome, CartError> {
        if !confirmer.confirm(&DestructiveAction::ClearCart(user)).await {
            debug!("Clear declined");
            return Ok(MutationOutcome::Declined);
        }

        self.clear_cart_confirmed(user).await?;
        Ok(MutationOutcome::Applied)
    }

    /// Clear without asking; used once an order has been placed.
    pub(crate) async fn clear_cart_confirmed(&self, user: UserId) -> Result<(), ApiError> {
        self.api.clear_cart(user).await.inspect_err(|e| {
            warn!(user = %user, error = %e, "Failed to clear cart");
        })?;
        self.invalidate(user).await;
        Ok(())
    }

    /// Add a product variant to the cart.
    ///
    /// # Errors
    ///
    /// Returns the service error; the cache is left untouched on failure.
    #[instrument(skip(self, request), fields(user = %user, product = %request.product_id))]
    pub async fn add_to_cart(
        &self,
        user: UserId,
        request: &AddToCartRequest,
    ) -> Result<(), ApiError> {
        self.api.add_to_cart(user, request).await?;
        self.invalidate(user).await;
        Ok(())
    }

    async fn invalidate(&self, user: UserId) {
        self.cache.invalidate(&CacheKey::Cart(user)).await;
    }
}
