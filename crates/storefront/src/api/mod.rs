//! Remote catalog/cart/order service contract.
//!
//! # Architecture
//!
//! - The remote service is the source of truth for carts and orders
//! - [`CommerceApi`] is the request/response contract every component talks to
//! - [`HttpCommerceApi`] implements it over JSON/HTTP with `reqwest`
//! - Tests substitute an in-memory implementation
//!
//! Every response is an envelope `{ data?, message?, errors? }`; failures are
//! classified into [`ApiError`] so callers can tell a rejected field from a
//! rejected request from an unreachable server.

mod http;
pub mod types;

pub use http::HttpCommerceApi;
pub use types::*;

use std::collections::BTreeMap;

use async_trait::async_trait;
use marigold_core::{CartItemId, Email, OrderId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::{CartLineItem, Quantity};

/// Errors that can occur when talking to the remote service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (connection refused, DNS failure, timeout).
    #[error("Cannot reach server: {0}")]
    Unreachable(String),

    /// HTTP client failure after a response started arriving.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected individual fields of the request.
    #[error("Rejected fields: {0}")]
    FieldErrors(FieldErrors),

    /// The server rejected the request as a whole.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// Whether the failure happened before any response was received.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Whether re-issuing the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::Http(_) | Self::RateLimited(_)
        ) || matches!(self, Self::Rejected { status, .. } if *status >= 500)
    }
}

/// Field-scoped error messages, keyed by wire field name (`firstName`, `phone`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Create an empty set of field errors.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record an error for a field, replacing any earlier message.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    /// Message for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Clear the message for a single field (the user edited it).
    pub fn clear_field(&mut self, field: &str) {
        self.0.remove(field);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Request/response contract of the remote catalog/cart/order service.
///
/// Implementations must not cache; caching and invalidation belong to
/// [`crate::cache::QueryCache`] and the components allowed to invalidate it.
#[async_trait]
pub trait CommerceApi: Send + Sync {
    /// Fetch every line item in a user's cart.
    async fn fetch_cart(&self, user: UserId) -> Result<Vec<CartLineItem>, ApiError>;

    /// Add a product variant to a user's cart.
    async fn add_to_cart(&self, user: UserId, item: &AddToCartRequest) -> Result<(), ApiError>;

    /// Set the quantity of one cart line. Returns the updated line when the server sends it.
    async fn update_quantity(
        &self,
        item: CartItemId,
        quantity: Quantity,
    ) -> Result<Option<CartLineItem>, ApiError>;

    /// Delete one cart line.
    async fn delete_item(&self, item: CartItemId) -> Result<(), ApiError>;

    /// Delete every line in a user's cart. Clearing an empty cart succeeds.
    async fn clear_cart(&self, user: UserId) -> Result<(), ApiError>;

    /// Create an order. Returns the created order when the server sends it back.
    async fn create_order(&self, order: &OrderRequest, email: &Email)
    -> Result<Option<Order>, ApiError>;

    /// Most recent order placed by `email`.
    async fn latest_order(&self, email: &Email) -> Result<Order, ApiError>;

    /// Full order with items.
    async fn order_detail(&self, order: OrderId) -> Result<Order, ApiError>;

    /// Orders placed by `email` with the given status.
    async fn orders_by_status(
        &self,
        status: OrderStatus,
        email: &Email,
    ) -> Result<Vec<Order>, ApiError>;

    /// Products on the authenticated user's wishlist.
    async fn wishlist(&self) -> Result<Vec<Product>, ApiError>;

    /// Add a product to the authenticated user's wishlist.
    async fn add_to_wishlist(&self, product: ProductId) -> Result<(), ApiError>;

    /// Remove a product from the authenticated user's wishlist.
    async fn remove_from_wishlist(&self, product: ProductId) -> Result<(), ApiError>;
}
