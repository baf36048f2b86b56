//! Async handle over one user's cart.

use std::sync::Arc;

use marigold_core::{CartItemId, Price, UserId};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::gateway::{CartGateway, MutationOutcome};
use super::model::{CartLineItem, Quantity};
use super::view::{CartViewModel, LoadState, QuantityEdit};
use super::{CartError, Confirmer};
use crate::api::{AddToCartRequest, OrderItemRequest};

/// Result of a quantity change once every request it triggered has resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// The server accepted the change; the line now shows this quantity.
    Applied(Quantity),
    /// Another update for the line was in flight; this target rides on it.
    Queued(Quantity),
    /// The target equalled the displayed quantity; nothing was sent.
    Unchanged(Quantity),
}

/// Shared, reconciled cart for the signed-in user.
///
/// The view lock is only held for synchronous bookkeeping, never across a
/// network call, so reads stay responsive while mutations are in flight.
#[derive(Clone)]
pub struct ShoppingCart {
    gateway: CartGateway,
    view: Arc<Mutex<CartViewModel>>,
}

impl ShoppingCart {
    #[must_use]
    pub fn new(gateway: CartGateway) -> Self {
        Self {
            gateway,
            view: Arc::new(Mutex::new(CartViewModel::new())),
        }
    }

    #[must_use]
    pub const fn gateway(&self) -> &CartGateway {
        &self.gateway
    }

    /// Set (or forget) the identity the cart belongs to.
    pub async fn identify(&self, user: Option<UserId>) {
        self.view.lock().await.set_user(user);
    }

    pub async fn user(&self) -> Option<UserId> {
        self.view.lock().await.user()
    }

    pub async fn load_state(&self) -> LoadState {
        self.view.lock().await.load_state().clone()
    }

    /// Fetch the cart and merge it into the view.
    ///
    /// A snapshot that arrives after the identity changed is discarded.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NoIdentity` without a request when no user is
    /// known, or the fetch error (the previous snapshot is kept).
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), CartError> {
        let user = self.view.lock().await.begin_load()?;
        let result = self.gateway.fetch_cart(user).await;

        let mut view = self.view.lock().await;
        if view.user() != Some(user) {
            debug!(user = %user, "Discarding cart snapshot for a previous identity");
            return Ok(());
        }

        match result {
            Ok(items) => {
                view.apply_snapshot(items);
                Ok(())
            }
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to load cart");
                view.load_failed(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Lines as currently displayed.
    pub async fn items(&self) -> Vec<CartLineItem> {
        self.view.lock().await.items()
    }

    /// Subtotal of the checked lines.
    pub async fn subtotal(&self) -> Price {
        self.view.lock().await.subtotal()
    }

    /// Flip one line's selection.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownItem` if the line is not in the cart.
    pub async fn toggle_checked(&self, id: CartItemId) -> Result<bool, CartError> {
        self.view
            .lock()
            .await
            .toggle_checked(id)
            .ok_or(CartError::UnknownItem(id))
    }

    pub async fn set_all_checked(&self, checked: bool) {
        self.view.lock().await.set_all_checked(checked);
    }

    /// Order lines for the checked subset.
    pub async fn checkout_items(&self) -> Vec<OrderItemRequest> {
        self.view.lock().await.checked_order_items()
    }

    /// Change a line's quantity by `delta`, clamped so it never drops below 1.
    ///
    /// The new quantity is displayed immediately. Edits to a line that already
    /// has a request in flight are coalesced and sent once it resolves. On
    /// failure the line reverts to its last confirmed quantity.
    ///
    /// # Errors
    ///
    /// Returns `UnknownItem` for a line not in the cart, or the service error
    /// after reverting.
    #[instrument(skip(self), fields(item = %id, delta))]
    pub async fn change_quantity(
        &self,
        id: CartItemId,
        delta: i64,
    ) -> Result<QuantityChange, CartError> {
        let (user, edit) = {
            let mut view = self.view.lock().await;
            let user = view.user().ok_or(CartError::NoIdentity)?;
            (user, view.begin_quantity_edit(id, delta)?)
        };

        let mut target = match edit {
            QuantityEdit::Send(quantity) => quantity,
            QuantityEdit::Queued(quantity) => return Ok(QuantityChange::Queued(quantity)),
            QuantityEdit::Unchanged(quantity) => return Ok(QuantityChange::Unchanged(quantity)),
        };

        loop {
            match self.gateway.update_quantity(user, id, target).await {
                Ok(line) => {
                    let mut view = self.view.lock().await;
                    match view.confirm_quantity_edit(id, line) {
                        Some(next) => target = next,
                        None => {
                            let shown = view.item(id).map_or(target, |l| l.quantity);
                            return Ok(QuantityChange::Applied(shown));
                        }
                    }
                }
                Err(e) => {
                    let reverted = self.view.lock().await.revert_quantity_edit(id);
                    warn!(
                        error = %e,
                        reverted_to = ?reverted.map(Quantity::get),
                        "Quantity update failed, reverted"
                    );
                    return Err(e.into());
                }
            }
        }
    }

    /// Delete a line after confirmation.
    ///
    /// # Errors
    ///
    /// Returns `NoIdentity`, `UnknownItem`, or the service error.
    pub async fn delete_item(
        &self,
        id: CartItemId,
        confirmer: &dyn Confirmer,
    ) -> Result<MutationOutcome, CartError> {
        let user = {
            let view = self.view.lock().await;
            let user = view.user().ok_or(CartError::NoIdentity)?;
            if view.item(id).is_none() {
                return Err(CartError::UnknownItem(id));
            }
            user
        };

        let outcome = self.gateway.delete_item(user, id, confirmer).await?;
        if outcome == MutationOutcome::Applied {
            self.view.lock().await.remove_item(id);
        }
        Ok(outcome)
    }

    /// Clear the whole cart after confirmation.
    ///
    /// # Errors
    ///
    /// Returns `NoIdentity` or the service error.
    pub async fn clear(&self, confirmer: &dyn Confirmer) -> Result<MutationOutcome, CartError> {
        let user = self.view.lock().await.user().ok_or(CartError::NoIdentity)?;
        let outcome = self.gateway.clear_cart(user, confirmer).await?;
        if outcome == MutationOutcome::Applied {
            self.view.lock().await.clear();
        }
        Ok(outcome)
    }

    /// Add a product variant, then refresh the view.
    ///
    /// # Errors
    ///
    /// Returns `NoIdentity` or the service error.
    pub async fn add(&self, request: &AddToCartRequest) -> Result<(), CartError> {
        let user = self.view.lock().await.user().ok_or(CartError::NoIdentity)?;
        self.gateway.add_to_cart(user, request).await?;
        self.load().await
    }
}
