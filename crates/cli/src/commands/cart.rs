//! Cart commands.

use std::io::Write;

use marigold_core::{CartItemId, ProductId};
use marigold_storefront::api::AddToCartRequest;
use marigold_storefront::cart::{
    CartError, CartLineItem, Confirmer, MutationOutcome, Quantity, QuantityChange,
};
use marigold_storefront::{Storefront, StorefrontError};

use super::require_user;

fn write_line(out: &mut impl Write, line: &CartLineItem) -> std::io::Result<()> {
    let variant = [line.color.as_deref(), line.size.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" / ");

    writeln!(
        out,
        "{:>6}  {:<32} {:<14} x{:<4} {:>14}",
        line.cart_item_id,
        line.product.display_name(),
        variant,
        line.quantity,
        line.line_total().to_string()
    )
}

/// List the cart with every line selected.
///
/// # Errors
///
/// Returns an error when signed out or if the cart cannot be fetched.
pub async fn show(storefront: &Storefront, out: &mut impl Write) -> Result<(), StorefrontError> {
    require_user(storefront).await?;
    let cart = storefront.cart();
    cart.load().await?;
    cart.set_all_checked(true).await;

    let items = cart.items().await;
    if items.is_empty() {
        writeln!(out, "Your cart is empty")?;
        return Ok(());
    }

    for line in &items {
        write_line(out, line)?;
    }
    writeln!(out, "Subtotal: {}", cart.subtotal().await)?;
    Ok(())
}

/// Add a product to the cart.
///
/// # Errors
///
/// Returns an error for a quantity below 1, when signed out, or if the request fails.
pub async fn add(
    storefront: &Storefront,
    product_id: ProductId,
    quantity: i64,
    color: Option<String>,
    size: Option<String>,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    let quantity = Quantity::try_from(quantity).map_err(CartError::from)?;
    require_user(storefront).await?;

    let request = AddToCartRequest {
        product_id,
        quantity,
        color,
        size,
    };
    storefront.cart().add(&request).await?;
    writeln!(out, "Added {quantity} x product {product_id}")?;
    Ok(())
}

/// Change a line's quantity by `delta` (never below 1).
///
/// # Errors
///
/// Returns an error for an unknown line, when signed out, or if the update fails.
pub async fn change_quantity(
    storefront: &Storefront,
    item: CartItemId,
    delta: i64,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    require_user(storefront).await?;
    let cart = storefront.cart();
    cart.load().await?;

    match cart.change_quantity(item, delta).await? {
        QuantityChange::Applied(quantity) | QuantityChange::Queued(quantity) => {
            writeln!(out, "Item {item} quantity is now {quantity}")?;
        }
        QuantityChange::Unchanged(quantity) => {
            writeln!(out, "Item {item} already at {quantity}")?;
        }
    }
    Ok(())
}

/// Remove one line after confirmation.
///
/// # Errors
///
/// Returns an error for an unknown line, when signed out, or if the delete fails.
pub async fn remove(
    storefront: &Storefront,
    item: CartItemId,
    confirmer: &dyn Confirmer,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    require_user(storefront).await?;
    let cart = storefront.cart();
    cart.load().await?;

    match cart.delete_item(item, confirmer).await? {
        MutationOutcome::Applied => writeln!(out, "Removed item {item}")?,
        MutationOutcome::Declined => writeln!(out, "Kept item {item}")?,
    }
    Ok(())
}

/// Remove every line after confirmation.
///
/// # Errors
///
/// Returns an error when signed out or if the clear fails.
pub async fn clear(
    storefront: &Storefront,
    confirmer: &dyn Confirmer,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    require_user(storefront).await?;

    match storefront.cart().clear(confirmer).await? {
        MutationOutcome::Applied => writeln!(out, "Cart cleared")?,
        MutationOutcome::Declined => writeln!(out, "Cart kept")?,
    }
    Ok(())
}
