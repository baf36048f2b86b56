//! Cart line items and quantities.

use marigold_core::{CartItemId, Price};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{OrderItemRequest, Product};

/// Errors constructing a [`Quantity`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity must be at least 1 (got {0})")]
    BelowOne(i64),
    #[error("quantity {0} is too large")]
    TooLarge(i64),
}

/// A cart or order quantity, always at least 1.
///
/// Decrementing past 1 clamps instead of reaching zero; removing a line is a
/// separate, explicit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Self = Self(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::BelowOne` for zero.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            return Err(QuantityError::BelowOne(0));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// `max(1, self + delta)`, saturating at `u32::MAX`.
    #[must_use]
    pub fn apply_delta(self, delta: i64) -> Self {
        let target = i64::from(self.0).saturating_add(delta);
        let clamped = target.clamp(1, i64::from(u32::MAX));
        Self(u32::try_from(clamped).unwrap_or(u32::MAX))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 1 {
            return Err(QuantityError::BelowOne(value));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line of a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Server-assigned, immutable.
    pub cart_item_id: CartItemId,
    pub product: Product,
    pub quantity: Quantity,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    /// Client-only selection flag; the server never sees it.
    #[serde(default, skip_serializing)]
    pub checked: bool,
}

impl CartLineItem {
    /// `unit price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.unit_price().times(self.quantity.get())
    }

    /// Snapshot of this line for an order-creation request.
    #[must_use]
    pub fn to_order_item(&self) -> OrderItemRequest {
        OrderItemRequest {
            product_id: self.product.product_id,
            quantity: self.quantity,
            color: self.color.clone(),
            size: self.size.clone(),
        }
    }
}
