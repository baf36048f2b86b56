//! Wishlist commands.

use std::io::Write;

use marigold_core::ProductId;
use marigold_storefront::{Storefront, StorefrontError};

use super::require_user;

/// List wishlist products.
///
/// # Errors
///
/// Returns an error when signed out or if the fetch fails.
pub async fn list(storefront: &Storefront, out: &mut impl Write) -> Result<(), StorefrontError> {
    let user = require_user(storefront).await?;
    let products = storefront.wishlist(user.id).list().await?;

    if products.is_empty() {
        writeln!(out, "Your wishlist is empty")?;
    }
    for product in &products {
        writeln!(
            out,
            "{:>6}  {:<32} {:>14}",
            product.product_id,
            product.display_name(),
            product.unit_price().to_string()
        )?;
    }
    Ok(())
}

/// Add a product to the wishlist.
///
/// # Errors
///
/// Returns an error when signed out or if the request fails.
pub async fn add(
    storefront: &Storefront,
    product: ProductId,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    let user = require_user(storefront).await?;
    storefront.wishlist(user.id).add(product).await?;
    writeln!(out, "Added product {product} to your wishlist")?;
    Ok(())
}

/// Remove a product from the wishlist.
///
/// # Errors
///
/// Returns an error when signed out or if the request fails.
pub async fn remove(
    storefront: &Storefront,
    product: ProductId,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    let user = require_user(storefront).await?;
    storefront.wishlist(user.id).remove(product).await?;
    writeln!(out, "Removed product {product} from your wishlist")?;
    Ok(())
}
