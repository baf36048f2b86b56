//! Checkout commands.

use std::io::Write;

use marigold_storefront::StorefrontError;
use marigold_storefront::Storefront;
use marigold_storefront::checkout::{CheckoutError, ShippingForm};
use tracing::{info, warn};

use super::require_user;
use crate::PlaceArgs;

/// Run a full checkout over the selected cart lines.
///
/// # Errors
///
/// Returns an error when signed out, for invalid input, or if a remote step
/// fails. A failed cart clear leaves the order in place; retry with `resume`.
pub async fn place(
    storefront: &Storefront,
    args: PlaceArgs,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    // The order is created before the payment step, so everything that step
    // needs is checked up front.
    if !args.accept_terms {
        return Err(CheckoutError::TermsNotAccepted.into());
    }

    let user = require_user(storefront).await?;
    let cart = storefront.cart();
    cart.load().await?;

    if args.items.is_empty() {
        cart.set_all_checked(true).await;
    } else {
        cart.set_all_checked(false).await;
        for item in &args.items {
            cart.toggle_checked(*item).await?;
        }
    }

    let pipeline = storefront.checkout();
    pipeline.begin(user, cart.checkout_items().await).await;
    pipeline
        .set_form(ShippingForm {
            first_name: args.first_name,
            last_name: args.last_name,
            country: args.country,
            street: args.street,
            city: args.city,
            state: args.state.unwrap_or_default(),
            zip: args.zip,
            phone: args.phone,
        })
        .await?;
    pipeline.set_shipping_method(args.shipping).await?;

    let order = pipeline.submit_shipping().await?;
    match order.id {
        Some(id) => writeln!(out, "Order #{id} created")?,
        None => writeln!(out, "Order created")?,
    }

    // Past this point the order exists; a display failure must not strand it.
    match pipeline.price_breakdown().await {
        Ok(breakdown) => {
            writeln!(out, "  Products: {:>14}", breakdown.product_price.to_string())?;
            writeln!(out, "  Shipping: {:>14}", breakdown.shipping_fee.to_string())?;
            writeln!(out, "  Total:    {:>14}", breakdown.subtotal.to_string())?;
        }
        Err(e) => {
            warn!(error = %e, "Price breakdown unavailable");
            writeln!(out, "  Price breakdown unavailable: {e}")?;
        }
    }

    pipeline.select_payment_method(args.payment).await?;
    pipeline.accept_terms(true).await?;

    if let Err(e) = pipeline.place_order().await {
        if matches!(e, CheckoutError::Api(_)) {
            writeln!(
                out,
                "Your order was placed but the cart could not be cleared; run `mg checkout resume` to retry"
            )?;
        }
        return Err(e.into());
    }

    pipeline.return_to_catalog().await?;
    info!(order_id = ?order.id, "Checkout completed");
    writeln!(out, "Thank you! Your order is complete.")?;
    Ok(())
}

/// Retry a cart clear left pending by an earlier checkout.
///
/// # Errors
///
/// Returns an error if the clear fails again.
pub async fn resume(storefront: &Storefront, out: &mut impl Write) -> Result<(), StorefrontError> {
    match storefront.checkout().resume_pending_clear().await? {
        Some(marker) => {
            let order = marker
                .order_id
                .map_or_else(|| "your last order".to_string(), |id| format!("order #{id}"));
            writeln!(out, "Cart cleared for {order}")?;
        }
        None => writeln!(out, "Nothing to resume")?,
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marigold_integration_tests::{Failure, FakeStore, Op, signed_in};
    use marigold_storefront::checkout::{PaymentMethod, ShippingMethod, Stage};
    use marigold_storefront::session::{SessionStore, keys};
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(accept_terms: bool) -> PlaceArgs {
        PlaceArgs {
            first_name: "Lan".to_string(),
            last_name: "Nguyen".to_string(),
            country: "Vietnam".to_string(),
            street: "12 Ly Thuong Kiet".to_string(),
            city: "Hanoi".to_string(),
            state: None,
            zip: "100000".to_string(),
            phone: "0912345678".to_string(),
            shipping: ShippingMethod::default(),
            payment: PaymentMethod::CashOnDelivery,
            accept_terms,
            items: Vec::new(),
        }
    }

    // =========================================================================
    // place
    // =========================================================================

    #[tokio::test]
    async fn test_place_without_terms_creates_no_order() {
        let fake = FakeStore::new();
        let (storefront, user) = signed_in(&fake).await;
        let shirt = fake.add_product(1, "Linen shirt", 100_000);
        fake.seed_line(user.id, &shirt, 2);

        for _ in 0..2 {
            let err = place(&storefront, args(false), &mut Vec::new())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                StorefrontError::Checkout(CheckoutError::TermsNotAccepted)
            ));
        }

        assert_eq!(fake.calls(Op::CreateOrder), 0);
        assert!(fake.orders().is_empty());
        assert_eq!(fake.cart_of(user.id).len(), 1);
    }

    #[tokio::test]
    async fn test_place_completes_when_breakdown_fetch_fails() {
        let fake = FakeStore::new();
        let (storefront, user) = signed_in(&fake).await;
        let shirt = fake.add_product(1, "Linen shirt", 100_000);
        fake.seed_line(user.id, &shirt, 2);
        fake.fail_next(Op::OrderDetail, Failure::Unreachable);

        let mut out = Vec::new();
        place(&storefront, args(true), &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Price breakdown unavailable"));
        assert!(out.contains("Thank you!"));
        assert_eq!(fake.orders().len(), 1);
        assert!(fake.cart_of(user.id).is_empty());
        assert_eq!(storefront.checkout().stage().await, None);
    }

    #[tokio::test]
    async fn test_place_leaves_resumable_marker_when_clear_fails() {
        let fake = FakeStore::new();
        let (storefront, user) = signed_in(&fake).await;
        let shirt = fake.add_product(1, "Linen shirt", 100_000);
        fake.seed_line(user.id, &shirt, 2);
        fake.fail_next(Op::ClearCart, Failure::Unreachable);

        let mut out = Vec::new();
        place(&storefront, args(true), &mut out).await.unwrap_err();
        assert_eq!(storefront.checkout().stage().await, Some(Stage::Payment));
        assert!(
            storefront
                .session()
                .get(keys::PENDING_CART_CLEAR)
                .await
                .unwrap()
                .is_some()
        );

        resume(&storefront, &mut out).await.unwrap();
        assert_eq!(fake.orders().len(), 1);
        assert!(fake.cart_of(user.id).is_empty());
        assert_eq!(fake.calls(Op::CreateOrder), 1);
    }
}
