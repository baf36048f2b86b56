//! Wire types for the remote service.
//!
//! Field names follow the service's camelCase JSON. Optional fields are
//! `Option` or `#[serde(default)]` because the service omits nulls freely.

use chrono::{DateTime, NaiveDateTime, Utc};
use marigold_core::{Email, OrderId, OrderItemId, OrderStatus, Price, ProductId, UserId};
use serde::{Deserialize, Deserializer, Serialize};

use super::FieldErrors;
use crate::cart::Quantity;
use crate::checkout::ShippingMethod;

// =============================================================================
// Envelope
// =============================================================================

/// Response envelope wrapping every payload.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<FieldErrors>,
}

// =============================================================================
// Catalog
// =============================================================================

/// Product as embedded in cart lines and wishlists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Unit price. Missing prices count as zero in totals.
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
}

impl Product {
    /// Unit price, treating a missing price as zero.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.price.unwrap_or(Price::ZERO)
    }

    /// Display name, falling back to the product id.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.product_name
            .clone()
            .unwrap_or_else(|| format!("Product #{}", self.product_id))
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Request body for adding a product variant to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// One line of an order-creation request.
///
/// Captured from the checked cart lines when checkout starts; later cart edits
/// never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Order-creation request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub country: String,
    pub zip: String,
    pub phone: String,
    pub shipping_method: ShippingMethod,
    pub shipping_price: Price,
    pub order_items: Vec<OrderItemRequest>,
}

/// One line of a server-side order (a copy, not a live cart reference).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub id: Option<OrderItemId>,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    /// Unit price at the time of ordering.
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

/// Server-owned order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "orderId")]
    pub id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub order_status: OrderStatus,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub shipping_method: Option<String>,
    /// Shipping fee. Older responses call it `shippingPrice`.
    #[serde(default, alias = "shippingPrice")]
    pub shipping_fee: Price,
    /// Product total before shipping.
    #[serde(default)]
    pub total_price: Price,
    /// Grand total when the server computes it.
    #[serde(default)]
    pub subtotal: Option<Price>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
}

impl Order {
    /// Price breakdown shown on the payment stage.
    #[must_use]
    pub fn breakdown(&self) -> PriceBreakdown {
        PriceBreakdown {
            product_price: self.total_price,
            shipping_fee: self.shipping_fee,
            subtotal: self
                .subtotal
                .unwrap_or(self.total_price + self.shipping_fee),
        }
    }
}

/// Authoritative price breakdown of a created order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub product_price: Price,
    pub shipping_fee: Price,
    pub subtotal: Price,
}

/// Where an order lives: its id when the server returned one, else the buyer's
/// email (resolved through the "latest order" endpoint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRef {
    pub id: Option<OrderId>,
    pub email: Email,
}

/// Accept RFC 3339 timestamps or zone-less ISO timestamps (treated as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}
