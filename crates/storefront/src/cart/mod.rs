//! Shopping cart: line items, the reconciled client view and the mutation gateway.
//!
//! # Architecture
//!
//! - [`CartViewModel`] holds the last confirmed snapshot plus in-flight edits
//! - [`CartGateway`] issues mutations and owns cart cache invalidation
//! - [`ShoppingCart`] ties the two together behind one async handle
//!
//! Destructive mutations (delete a line, clear the cart) ask a [`Confirmer`]
//! first; a declined confirmation issues no request.

mod gateway;
mod model;
mod store;
mod view;

pub use gateway::{CartGateway, MutationOutcome};
pub use model::{CartLineItem, Quantity, QuantityError};
pub use store::{QuantityChange, ShoppingCart};
pub use view::{CartViewModel, LoadState, QuantityEdit};

use async_trait::async_trait;
use marigold_core::{CartItemId, UserId};
use thiserror::Error;

use crate::api::ApiError;
use crate::session::SessionError;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No user identity is known, so there is no cart to act on.
    #[error("No signed-in user")]
    NoIdentity,

    #[error("Cart item {0} is not in the cart")]
    UnknownItem(CartItemId),

    #[error(transparent)]
    Quantity(#[from] QuantityError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CartError {
    /// Whether the remote service could not be reached at all.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_unreachable())
    }
}

/// A mutation that needs the user's explicit confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestructiveAction {
    DeleteItem(CartItemId),
    ClearCart(UserId),
}

impl DestructiveAction {
    /// Question to put to the user.
    #[must_use]
    pub fn prompt(&self) -> String {
        match self {
            Self::DeleteItem(id) => format!("Remove item {id} from your cart?"),
            Self::ClearCart(_) => "Remove every item from your cart?".to_string(),
        }
    }
}

/// Asks the user to confirm a destructive action.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, action: &DestructiveAction) -> bool;
}

/// Confirms everything (non-interactive use).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

#[async_trait]
impl Confirmer for AlwaysConfirm {
    async fn confirm(&self, _action: &DestructiveAction) -> bool {
        true
    }
}

/// Declines everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverConfirm;

#[async_trait]
impl Confirmer for NeverConfirm {
    async fn confirm(&self, _action: &DestructiveAction) -> bool {
        false
    }
}
