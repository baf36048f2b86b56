//! Command implementations. Each writes its human-readable output to `out`.

pub mod account;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod wishlist;

use marigold_storefront::session::CurrentUser;
use marigold_storefront::{Storefront, StorefrontError};

/// Signed-in user, with the cart pointed at them.
async fn require_user(storefront: &Storefront) -> Result<CurrentUser, StorefrontError> {
    storefront
        .restore_session()
        .await?
        .ok_or(StorefrontError::SignedOut)
}
