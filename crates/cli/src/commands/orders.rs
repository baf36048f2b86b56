//! Order history commands.

use std::io::Write;

use marigold_core::{OrderId, OrderStatus};
use marigold_storefront::api::Order;
use marigold_storefront::{Storefront, StorefrontError};

use super::require_user;

fn write_summary(out: &mut impl Write, order: &Order) -> std::io::Result<()> {
    let placed = order
        .created_at
        .map_or_else(String::new, |t| t.format("%Y-%m-%d %H:%M").to_string());
    writeln!(
        out,
        "#{:<8} {:<10} {:<16} {:>14}",
        order.id,
        order.order_status,
        placed,
        order.breakdown().subtotal.to_string()
    )
}

fn write_detail(out: &mut impl Write, order: &Order) -> std::io::Result<()> {
    write_summary(out, order)?;
    if let Some(address) = &order.shipping_address {
        writeln!(out, "  Ship to: {address}")?;
    }
    for item in &order.order_items {
        let name = item
            .product_name
            .clone()
            .unwrap_or_else(|| format!("Product #{}", item.product_id));
        writeln!(
            out,
            "  {:<32} x{:<4} {:>14}",
            name,
            item.quantity,
            item.price.times(item.quantity).to_string()
        )?;
    }
    let breakdown = order.breakdown();
    writeln!(out, "  Products: {}", breakdown.product_price)?;
    writeln!(out, "  Shipping: {}", breakdown.shipping_fee)?;
    writeln!(out, "  Total:    {}", breakdown.subtotal)
}

/// Show the most recent order.
///
/// # Errors
///
/// Returns an error when signed out or if the fetch fails.
pub async fn latest(storefront: &Storefront, out: &mut impl Write) -> Result<(), StorefrontError> {
    let user = require_user(storefront).await?;
    let order = storefront.orders().latest(&user.email).await?;
    write_detail(out, &order)?;
    Ok(())
}

/// List orders in one status.
///
/// # Errors
///
/// Returns an error when signed out or if the fetch fails.
pub async fn list(
    storefront: &Storefront,
    status: OrderStatus,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    let user = require_user(storefront).await?;
    let orders = storefront.orders().by_status(status, &user.email).await?;

    if orders.is_empty() {
        writeln!(out, "No {} orders", status.as_str().to_ascii_lowercase())?;
        return Ok(());
    }
    for order in &orders {
        write_summary(out, order)?;
    }
    Ok(())
}

/// Show one order with its items.
///
/// # Errors
///
/// Returns an error when signed out or if the fetch fails.
pub async fn show(
    storefront: &Storefront,
    id: OrderId,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    require_user(storefront).await?;
    let order = storefront.orders().detail(id).await?;
    write_detail(out, &order)?;
    Ok(())
}
