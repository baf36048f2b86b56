//! Cart view model: the reconciled, client-side view of one user's cart.
//!
//! The displayed cart is the last confirmed server snapshot with in-flight
//! quantity edits layered on top. Edits are never merged into the snapshot
//! until the server confirms them, so a failed request reverts by simply
//! dropping the edit.
//!
//! Selection (`checked`) is client-only state. It survives refetches by
//! matching on `cartItemId`.

use std::collections::HashMap;

use marigold_core::{CartItemId, Price, UserId};

use super::CartError;
use super::model::{CartLineItem, Quantity};
use crate::api::OrderItemRequest;

/// Load status of the cart view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No user identity is known; loading is disabled.
    #[default]
    Disabled,
    /// Identity known, nothing fetched yet.
    Idle,
    Loading,
    Ready,
    /// Last fetch failed; the previous snapshot (if any) is kept untouched.
    Failed(String),
}

/// An in-flight quantity edit for one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingEdit {
    /// Quantity sent in the request currently in flight.
    in_flight: Quantity,
    /// Latest quantity requested while the first request was still in flight.
    queued: Option<Quantity>,
}

impl PendingEdit {
    fn displayed(&self) -> Quantity {
        self.queued.unwrap_or(self.in_flight)
    }
}

/// What the caller must do after starting a quantity edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityEdit {
    /// Issue an update request for this quantity.
    Send(Quantity),
    /// Another update for the same line is in flight; this target will be sent
    /// once it resolves.
    Queued(Quantity),
    /// The clamped target equals what is already displayed; nothing to send.
    Unchanged(Quantity),
}

/// Client-side cart state for one user.
#[derive(Debug, Default)]
pub struct CartViewModel {
    user: Option<UserId>,
    confirmed: Vec<CartLineItem>,
    pending: HashMap<CartItemId, PendingEdit>,
    state: LoadState,
}

impl CartViewModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current user, if known.
    #[must_use]
    pub const fn user(&self) -> Option<UserId> {
        self.user
    }

    #[must_use]
    pub const fn load_state(&self) -> &LoadState {
        &self.state
    }

    /// Set (or forget) the user identity.
    ///
    /// Switching to a different user discards the previous user's cart.
    pub fn set_user(&mut self, user: Option<UserId>) {
        if self.user == user {
            return;
        }
        self.user = user;
        self.confirmed.clear();
        self.pending.clear();
        self.state = if user.is_some() {
            LoadState::Idle
        } else {
            LoadState::Disabled
        };
    }

    /// User to load for, or `NoIdentity` when loading is disabled.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NoIdentity` while no user is known.
    pub fn begin_load(&mut self) -> Result<UserId, CartError> {
        let user = self.user.ok_or(CartError::NoIdentity)?;
        self.state = LoadState::Loading;
        Ok(user)
    }

    /// Record a failed fetch. The previous snapshot stays as it was.
    pub fn load_failed(&mut self, message: impl Into<String>) {
        self.state = LoadState::Failed(message.into());
    }

    /// Merge a fresh server snapshot.
    ///
    /// Quantities and product data take the server's value. `checked` is
    /// carried over from the previously held line with the same id, or starts
    /// `false` for new lines. Edits for lines that disappeared are dropped.
    pub fn apply_snapshot(&mut self, incoming: Vec<CartLineItem>) {
        let previous: HashMap<CartItemId, bool> = self
            .confirmed
            .iter()
            .map(|line| (line.cart_item_id, line.checked))
            .collect();

        self.confirmed = incoming
            .into_iter()
            .map(|mut line| {
                line.checked = previous.get(&line.cart_item_id).copied().unwrap_or(false);
                line
            })
            .collect();

        let present: Vec<CartItemId> = self.confirmed.iter().map(|l| l.cart_item_id).collect();
        self.pending.retain(|id, _| present.contains(id));
        self.state = LoadState::Ready;
    }

    /// Lines as displayed: confirmed snapshot with in-flight quantities applied.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.confirmed
            .iter()
            .map(|line| {
                let mut shown = line.clone();
                if let Some(edit) = self.pending.get(&line.cart_item_id) {
                    shown.quantity = edit.displayed();
                }
                shown
            })
            .collect()
    }

    /// Displayed line by id.
    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<CartLineItem> {
        self.items().into_iter().find(|line| line.cart_item_id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    /// Sum of `unit price × displayed quantity` over checked lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items()
            .iter()
            .filter(|line| line.checked)
            .map(CartLineItem::line_total)
            .sum()
    }

    /// Flip the selection of one line. Returns the new value, or `None` if
    /// the line is unknown.
    pub fn toggle_checked(&mut self, id: CartItemId) -> Option<bool> {
        let line = self.confirmed.iter_mut().find(|l| l.cart_item_id == id)?;
        line.checked = !line.checked;
        Some(line.checked)
    }

    /// Select or deselect every line.
    pub fn set_all_checked(&mut self, checked: bool) {
        for line in &mut self.confirmed {
            line.checked = checked;
        }
    }

    /// Order lines for the checked subset, as currently displayed.
    #[must_use]
    pub fn checked_order_items(&self) -> Vec<OrderItemRequest> {
        self.items()
            .iter()
            .filter(|line| line.checked)
            .map(CartLineItem::to_order_item)
            .collect()
    }

    /// Whether an update for this line is in flight.
    #[must_use]
    pub fn is_pending(&self, id: CartItemId) -> bool {
        self.pending.contains_key(&id)
    }

    // =========================================================================
    // Optimistic quantity edits
    // =========================================================================

    /// Start a quantity change of `delta` on a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownItem` if the line is not in the cart.
    pub fn begin_quantity_edit(
        &mut self,
        id: CartItemId,
        delta: i64,
    ) -> Result<QuantityEdit, CartError> {
        let confirmed = self
            .confirmed
            .iter()
            .find(|l| l.cart_item_id == id)
            .map(|l| l.quantity)
            .ok_or(CartError::UnknownItem(id))?;

        match self.pending.get_mut(&id) {
            Some(edit) => {
                let target = edit.displayed().apply_delta(delta);
                if target == edit.displayed() {
                    return Ok(QuantityEdit::Unchanged(target));
                }
                edit.queued = Some(target);
                Ok(QuantityEdit::Queued(target))
            }
            None => {
                let target = confirmed.apply_delta(delta);
                if target == confirmed {
                    return Ok(QuantityEdit::Unchanged(target));
                }
                self.pending.insert(
                    id,
                    PendingEdit {
                        in_flight: target,
                        queued: None,
                    },
                );
                Ok(QuantityEdit::Send(target))
            }
        }
    }

    /// The in-flight update for `id` succeeded.
    ///
    /// The confirmed quantity becomes the server's (or the sent value when the
    /// server returned no line). Returns the queued quantity that must be sent
    /// next, if any.
    pub fn confirm_quantity_edit(
        &mut self,
        id: CartItemId,
        server_line: Option<CartLineItem>,
    ) -> Option<Quantity> {
        let edit = self.pending.remove(&id)?;

        if let Some(line) = self.confirmed.iter_mut().find(|l| l.cart_item_id == id) {
            match server_line {
                Some(server) => {
                    let checked = line.checked;
                    *line = server;
                    line.checked = checked;
                }
                None => line.quantity = edit.in_flight,
            }

            if let Some(next) = edit.queued
                && next != line.quantity
            {
                self.pending.insert(
                    id,
                    PendingEdit {
                        in_flight: next,
                        queued: None,
                    },
                );
                return Some(next);
            }
        }
        None
    }

    /// The in-flight update for `id` failed: drop the edit (and anything queued
    /// behind it) so the line shows its confirmed quantity again.
    ///
    /// Returns the quantity the line reverted to.
    pub fn revert_quantity_edit(&mut self, id: CartItemId) -> Option<Quantity> {
        self.pending.remove(&id)?;
        self.confirmed
            .iter()
            .find(|l| l.cart_item_id == id)
            .map(|l| l.quantity)
    }

    /// A line was deleted server-side.
    pub fn remove_item(&mut self, id: CartItemId) {
        self.confirmed.retain(|l| l.cart_item_id != id);
        self.pending.remove(&id);
    }

    /// The cart was cleared server-side.
    pub fn clear(&mut self) {
        self.confirmed.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use marigold_core::ProductId;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::api::Product;

    fn line(id: i64, quantity: u32, price: i64) -> CartLineItem {
        CartLineItem {
            cart_item_id: CartItemId::new(id),
            product: Product {
                product_id: ProductId::new(id * 10),
                product_name: Some(format!("Item {id}")),
                description: None,
                price: Some(Price::from_units(price)),
                stock_quantity: None,
                image_url: None,
                category_name: None,
                sizes: vec![],
                colors: vec![],
            },
            quantity: Quantity::new(quantity).unwrap(),
            color: None,
            size: None,
            checked: false,
        }
    }

    /// A server line that (wrongly) arrives already selected.
    fn preselected(mut line: CartLineItem) -> CartLineItem {
        line.checked = true;
        line
    }

    fn loaded(lines: Vec<CartLineItem>) -> CartViewModel {
        let mut view = CartViewModel::new();
        view.set_user(Some(UserId::new(1)));
        view.apply_snapshot(lines);
        view
    }

    #[test]
    fn test_load_disabled_without_identity() {
        let mut view = CartViewModel::new();
        assert_eq!(view.load_state(), &LoadState::Disabled);
        assert!(matches!(view.begin_load(), Err(CartError::NoIdentity)));

        view.set_user(Some(UserId::new(3)));
        assert_eq!(view.begin_load().unwrap(), UserId::new(3));
        assert_eq!(view.load_state(), &LoadState::Loading);
    }

    #[test]
    fn test_subtotal_counts_checked_lines_only() {
        let mut view = loaded(vec![line(1, 2, 100_000), line(2, 1, 50_000)]);
        view.toggle_checked(CartItemId::new(1));
        assert_eq!(view.subtotal(), Price::from_units(200_000));

        view.set_all_checked(true);
        assert_eq!(view.subtotal(), Price::from_units(250_000));

        view.set_all_checked(false);
        assert_eq!(view.subtotal(), Price::ZERO);
    }

    #[test]
    fn test_refetch_preserves_checked_and_takes_server_quantity() {
        let mut view = loaded(vec![line(1, 2, 100_000), line(2, 1, 50_000)]);
        view.toggle_checked(CartItemId::new(2));

        view.apply_snapshot(vec![
            line(2, 7, 50_000),
            preselected(line(3, 1, 10_000)),
            preselected(line(1, 2, 100_000)),
        ]);

        let checked: Vec<(i64, bool, u32)> = view
            .items()
            .iter()
            .map(|l| (l.cart_item_id.as_i64(), l.checked, l.quantity.get()))
            .collect();
        assert_eq!(checked, vec![(2, true, 7), (3, false, 1), (1, false, 2)]);
    }

    #[test]
    fn test_quantity_edit_is_optimistic_until_confirmed() {
        let mut view = loaded(vec![line(1, 2, 100_000)]);
        let id = CartItemId::new(1);
        view.toggle_checked(id);

        assert_eq!(
            view.begin_quantity_edit(id, 1).unwrap(),
            QuantityEdit::Send(Quantity::new(3).unwrap())
        );
        assert_eq!(view.item(id).unwrap().quantity.get(), 3);
        assert_eq!(view.subtotal(), Price::from_units(300_000));

        assert_eq!(view.confirm_quantity_edit(id, None), None);
        assert!(!view.is_pending(id));
        assert_eq!(view.item(id).unwrap().quantity.get(), 3);
    }

    #[test]
    fn test_failed_edit_reverts() {
        let mut view = loaded(vec![line(1, 2, 100_000)]);
        let id = CartItemId::new(1);

        view.begin_quantity_edit(id, 4).unwrap();
        assert_eq!(view.item(id).unwrap().quantity.get(), 6);

        assert_eq!(view.revert_quantity_edit(id), Some(Quantity::new(2).unwrap()));
        assert_eq!(view.item(id).unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_decrement_clamps_and_skips_noop() {
        let mut view = loaded(vec![line(1, 2, 100_000)]);
        let id = CartItemId::new(1);

        assert_eq!(
            view.begin_quantity_edit(id, -5).unwrap(),
            QuantityEdit::Send(Quantity::ONE)
        );
        view.confirm_quantity_edit(id, None);
        assert_eq!(
            view.begin_quantity_edit(id, -1).unwrap(),
            QuantityEdit::Unchanged(Quantity::ONE)
        );
        assert!(!view.is_pending(id));
    }

    #[test]
    fn test_edits_on_same_line_coalesce() {
        let mut view = loaded(vec![line(1, 1, 100_000)]);
        let id = CartItemId::new(1);

        assert!(matches!(view.begin_quantity_edit(id, 1).unwrap(), QuantityEdit::Send(q) if q.get() == 2));
        assert!(matches!(view.begin_quantity_edit(id, 1).unwrap(), QuantityEdit::Queued(q) if q.get() == 3));
        assert!(matches!(view.begin_quantity_edit(id, 1).unwrap(), QuantityEdit::Queued(q) if q.get() == 4));
        assert_eq!(view.item(id).unwrap().quantity.get(), 4);

        // First request lands; the coalesced target goes out next.
        assert_eq!(view.confirm_quantity_edit(id, None).map(Quantity::get), Some(4));
        assert_eq!(view.confirm_quantity_edit(id, None), None);
        assert_eq!(view.item(id).unwrap().quantity.get(), 4);
    }

    #[test]
    fn test_failure_discards_queued_target() {
        let mut view = loaded(vec![line(1, 1, 100_000)]);
        let id = CartItemId::new(1);

        view.begin_quantity_edit(id, 1).unwrap();
        view.begin_quantity_edit(id, 1).unwrap();
        view.revert_quantity_edit(id);
        assert_eq!(view.item(id).unwrap().quantity.get(), 1);
        assert!(!view.is_pending(id));
    }

    #[test]
    fn test_server_line_keeps_local_selection() {
        let mut view = loaded(vec![line(1, 1, 100_000)]);
        let id = CartItemId::new(1);
        view.toggle_checked(id);
        view.begin_quantity_edit(id, 1).unwrap();

        view.confirm_quantity_edit(id, Some(line(1, 2, 90_000)));
        let shown = view.item(id).unwrap();
        assert!(shown.checked);
        assert_eq!(shown.line_total(), Price::from_units(180_000));
    }

    #[test]
    fn test_switching_user_discards_cart() {
        let mut view = loaded(vec![line(1, 1, 100_000)]);
        view.set_user(Some(UserId::new(2)));
        assert!(view.is_empty());
        assert_eq!(view.load_state(), &LoadState::Idle);
        view.set_user(None);
        assert_eq!(view.load_state(), &LoadState::Disabled);
    }

    #[test]
    fn test_checked_order_items_snapshot() {
        let mut view = loaded(vec![line(1, 2, 100_000), line(2, 1, 50_000)]);
        view.toggle_checked(CartItemId::new(2));
        let items = view.checked_order_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().product_id, ProductId::new(20));
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Distinct lines with small quantities and arbitrary prices.
    fn arb_lines() -> impl Strategy<Value = Vec<CartLineItem>> {
        prop::collection::btree_map(1i64..64, (1u32..20, 0i64..5_000_000), 0..8).prop_map(
            |lines: BTreeMap<i64, (u32, i64)>| {
                lines
                    .into_iter()
                    .map(|(id, (quantity, price))| line(id, quantity, price))
                    .collect()
            },
        )
    }

    /// Lines, a selection pick per line, and the same lines in another order.
    fn arb_selected_and_shuffled()
    -> impl Strategy<Value = (Vec<CartLineItem>, Vec<bool>, Vec<CartLineItem>)> {
        arb_lines().prop_flat_map(|lines| {
            let n = lines.len();
            (
                Just(lines.clone()),
                prop::collection::vec(any::<bool>(), n),
                Just(lines).prop_shuffle(),
            )
        })
    }

    fn select(view: &mut CartViewModel, lines: &[CartLineItem], picks: &[bool]) {
        for (line, pick) in lines.iter().zip(picks) {
            if *pick {
                view.toggle_checked(line.cart_item_id);
            }
        }
    }

    proptest! {
        #[test]
        fn test_refetch_never_changes_selection(
            (lines, picks, shuffled) in arb_selected_and_shuffled(),
            server in prop::collection::vec((1u32..20, 0i64..5_000_000, any::<bool>()), 8),
        ) {
            let mut view = loaded(lines.clone());
            select(&mut view, &lines, &picks);

            let refetched: Vec<CartLineItem> = shuffled
                .iter()
                .zip(&server)
                .map(|(old, (quantity, price, checked))| {
                    let mut fresh = line(old.cart_item_id.as_i64(), *quantity, *price);
                    fresh.checked = *checked;
                    fresh
                })
                .collect();
            view.apply_snapshot(refetched);

            for (line, pick) in lines.iter().zip(&picks) {
                prop_assert_eq!(view.item(line.cart_item_id).map(|l| l.checked), Some(*pick));
            }
        }

        #[test]
        fn test_displayed_quantity_stays_at_least_one(
            start in 1u32..50,
            steps in prop::collection::vec((-100i64..100, 0u8..3), 0..32),
        ) {
            let id = CartItemId::new(1);
            let mut view = loaded(vec![line(1, start, 1_000)]);

            for (delta, outcome) in steps {
                view.begin_quantity_edit(id, delta).unwrap();
                match outcome {
                    0 => {}
                    1 => {
                        view.confirm_quantity_edit(id, None);
                    }
                    _ => {
                        view.revert_quantity_edit(id);
                    }
                }
                let shown = view.item(id).unwrap().quantity.get();
                prop_assert!(shown >= 1, "displayed quantity {} after delta {}", shown, delta);
            }
        }

        #[test]
        fn test_subtotal_ignores_line_order(
            (lines, picks, shuffled) in arb_selected_and_shuffled(),
        ) {
            let mut in_order = loaded(lines.clone());
            select(&mut in_order, &lines, &picks);

            let mut reordered = loaded(shuffled);
            select(&mut reordered, &lines, &picks);

            prop_assert_eq!(in_order.subtotal(), reordered.subtotal());
        }
    }
}
