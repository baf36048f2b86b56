//! Session identity commands.

use std::io::Write;

use marigold_core::{Email, UserId};
use marigold_storefront::session::{self, CurrentUser, PendingCartClear, keys};
use marigold_storefront::{Storefront, StorefrontError};

/// Record the signed-in user.
///
/// # Errors
///
/// Returns an error for an invalid email or if the session cannot be written.
pub async fn login(
    storefront: &Storefront,
    user_id: UserId,
    email: &str,
    token: Option<String>,
    out: &mut impl Write,
) -> Result<(), StorefrontError> {
    let email = Email::parse(email)
        .map_err(|e| StorefrontError::InvalidInput(format!("Invalid email: {e}")))?;

    let user = CurrentUser { id: user_id, email };
    storefront.sign_in(user.clone(), token).await?;
    writeln!(out, "Signed in as {} (user {})", user.email, user.id)?;
    Ok(())
}

/// Forget the signed-in user.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn logout(storefront: &Storefront, out: &mut impl Write) -> Result<(), StorefrontError> {
    storefront.sign_out().await?;
    writeln!(out, "Signed out")?;
    Ok(())
}

/// Show the signed-in user and any cart clear still owed by an earlier order.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn whoami(storefront: &Storefront, out: &mut impl Write) -> Result<(), StorefrontError> {
    match storefront.restore_session().await? {
        Some(user) => writeln!(out, "{} (user {})", user.email, user.id)?,
        None => writeln!(out, "Not signed in")?,
    }

    let pending: Option<PendingCartClear> =
        session::get_json(storefront.session(), keys::PENDING_CART_CLEAR).await?;
    if let Some(pending) = pending {
        let order = pending
            .order_id
            .map_or_else(|| "latest order".to_string(), |id| format!("order #{id}"));
        writeln!(
            out,
            "The cart was not cleared after {order}; run `mg checkout resume` to retry"
        )?;
    }
    Ok(())
}
