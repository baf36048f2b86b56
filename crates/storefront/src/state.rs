//! Shared storefront context.

use std::sync::Arc;

use marigold_core::UserId;
use tracing::{debug, info};

use crate::api::{ApiError, CommerceApi, HttpCommerceApi};
use crate::cache::QueryCache;
use crate::cart::{CartGateway, ShoppingCart};
use crate::checkout::CheckoutPipeline;
use crate::config::ClientConfig;
use crate::orders::OrderHistory;
use crate::session::{self, CurrentUser, FileSessionStore, SessionError, SessionStore};
use crate::wishlist::Wishlist;

/// Everything a front-end needs, wired to one remote service, cache and session.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: ClientConfig,
    api: Arc<dyn CommerceApi>,
    session: Arc<dyn SessionStore>,
    cache: QueryCache,
    cart: ShoppingCart,
    orders: OrderHistory,
    checkout: CheckoutPipeline,
}

impl Storefront {
    /// Wire the HTTP client and a file-backed session from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        let session: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::new(config.session_file.clone()));
        let api: Arc<dyn CommerceApi> = Arc::new(HttpCommerceApi::new(&config, Arc::clone(&session))?);
        Ok(Self::with_parts(config, api, session))
    }

    /// Wire the given service and session together.
    #[must_use]
    pub fn with_parts(
        config: ClientConfig,
        api: Arc<dyn CommerceApi>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        let cache = QueryCache::from_config(&config);
        let gateway = CartGateway::new(Arc::clone(&api), cache.clone());
        let orders = OrderHistory::new(Arc::clone(&api), cache.clone());
        let checkout = CheckoutPipeline::new(
            Arc::clone(&api),
            gateway.clone(),
            orders.clone(),
            Arc::clone(&session),
        );

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                session,
                cache,
                cart: ShoppingCart::new(gateway),
                orders,
                checkout,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &Arc<dyn CommerceApi> {
        &self.inner.api
    }

    #[must_use]
    pub fn session(&self) -> &dyn SessionStore {
        self.inner.session.as_ref()
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn cart(&self) -> &ShoppingCart {
        &self.inner.cart
    }

    #[must_use]
    pub fn orders(&self) -> &OrderHistory {
        &self.inner.orders
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutPipeline {
        &self.inner.checkout
    }

    /// Wishlist of `user`.
    #[must_use]
    pub fn wishlist(&self, user: UserId) -> Wishlist {
        Wishlist::new(Arc::clone(&self.inner.api), self.inner.cache.clone(), user)
    }

    /// Read the signed-in user from the session and point the cart at them.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read.
    pub async fn restore_session(&self) -> Result<Option<CurrentUser>, SessionError> {
        let user = session::current_user(self.session()).await?;
        debug!(user_id = ?user.as_ref().map(|u| u.id), "Session restored");
        self.inner.cart.identify(user.as_ref().map(|u| u.id)).await;
        Ok(user)
    }

    /// Record a sign-in and point the cart at the new user.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn sign_in(&self, user: CurrentUser, token: Option<String>) -> Result<(), SessionError> {
        session::sign_in(self.session(), &user, token).await?;
        self.inner.cart.identify(Some(user.id)).await;
        info!(user_id = %user.id, "Signed in");
        Ok(())
    }

    /// Forget the signed-in user; cart loading is disabled until the next sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        session::sign_out(self.session()).await?;
        self.inner.cart.identify(None).await;
        self.inner.checkout.abandon().await;
        Ok(())
    }
}
