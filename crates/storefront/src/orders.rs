//! Order history reads, served through the query cache.

use std::sync::Arc;

use marigold_core::{Email, OrderId, OrderStatus};
use tracing::{debug, instrument};

use crate::api::{ApiError, CommerceApi, Order, OrderRef, PriceBreakdown};
use crate::cache::{CacheKey, CacheValue, QueryCache};

/// Read-only view of a buyer's orders.
#[derive(Clone)]
pub struct OrderHistory {
    api: Arc<dyn CommerceApi>,
    cache: QueryCache,
}

impl OrderHistory {
    #[must_use]
    pub fn new(api: Arc<dyn CommerceApi>, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    /// Most recent order placed by `email`.
    ///
    /// # Errors
    ///
    /// Returns the service error when the order is not cached.
    #[instrument(skip(self))]
    pub async fn latest(&self, email: &Email) -> Result<Order, ApiError> {
        let key = CacheKey::LatestOrder(email.clone());
        if let Some(CacheValue::Order(order)) = self.cache.get(&key).await {
            return Ok(*order);
        }

        let order = self.api.latest_order(email).await?;
        self.cache
            .insert(key, CacheValue::Order(Box::new(order.clone())))
            .await;
        Ok(order)
    }

    /// Full order with items.
    ///
    /// # Errors
    ///
    /// Returns the service error when the order is not cached.
    #[instrument(skip(self), fields(order = %id))]
    pub async fn detail(&self, id: OrderId) -> Result<Order, ApiError> {
        let key = CacheKey::Order(id);
        if let Some(CacheValue::Order(order)) = self.cache.get(&key).await {
            return Ok(*order);
        }

        let order = self.api.order_detail(id).await?;
        self.cache
            .insert(key, CacheValue::Order(Box::new(order.clone())))
            .await;
        Ok(order)
    }

    /// Orders placed by `email` in one status tab, newest first.
    ///
    /// # Errors
    ///
    /// Returns the service error when the listing is not cached.
    #[instrument(skip(self), fields(status = %status))]
    pub async fn by_status(&self, status: OrderStatus, email: &Email) -> Result<Vec<Order>, ApiError> {
        let key = CacheKey::Orders {
            email: email.clone(),
            status,
        };
        if let Some(CacheValue::Orders(orders)) = self.cache.get(&key).await {
            return Ok(orders);
        }

        let mut orders = self.api.orders_by_status(status, email).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        debug!(count = orders.len(), "Fetched orders");
        self.cache
            .insert(key, CacheValue::Orders(orders.clone()))
            .await;
        Ok(orders)
    }

    /// Resolve an order reference: by id when known, else the buyer's latest order.
    ///
    /// # Errors
    ///
    /// Returns the service error.
    pub async fn resolve(&self, order: &OrderRef) -> Result<Order, ApiError> {
        match order.id {
            Some(id) => self.detail(id).await,
            None => self.latest(&order.email).await,
        }
    }

    /// Authoritative price breakdown of an order.
    ///
    /// # Errors
    ///
    /// Returns the service error.
    pub async fn breakdown(&self, order: &OrderRef) -> Result<PriceBreakdown, ApiError> {
        self.resolve(order).await.map(|o| o.breakdown())
    }
}
