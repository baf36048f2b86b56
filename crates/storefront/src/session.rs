//! Session storage.
//!
//! A tiny string key/value store holding the signed-in identity, the bearer
//! token and any cart-clear that still has to be retried after an order was
//! placed. The CLI persists it to a JSON file between invocations.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use marigold_core::{Email, OrderId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Session keys.
pub mod keys {
    /// JSON `{"userId": .., "email": ..}` of the signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Bearer token for authenticated requests.
    pub const USER_TOKEN: &str = "user_token";

    /// JSON [`super::PendingCartClear`] left behind when an order was created
    /// but its cart could not be cleared.
    pub const PENDING_CART_CLEAR: &str = "pending_cart_clear";
}

/// Errors reading or writing the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session value for '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key/value session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), SessionError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// Signed-in user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(rename = "userId")]
    pub id: UserId,
    pub email: Email,
}

/// Order whose cart still has to be cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCartClear {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    pub user_id: UserId,
}

/// Read and decode a JSON value.
///
/// # Errors
///
/// Returns `SessionError::Corrupt` if the stored value is not valid JSON for `T`.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn SessionStore,
    key: &str,
) -> Result<Option<T>, SessionError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| SessionError::Corrupt {
            key: key.to_string(),
            source,
        })
}

/// Encode and store a JSON value.
///
/// # Errors
///
/// Returns an error if encoding or the underlying store fails.
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn SessionStore,
    key: &str,
    value: &T,
) -> Result<(), SessionError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw).await
}

/// Signed-in user, if any.
///
/// # Errors
///
/// Returns an error if the store fails or the stored identity is corrupt.
pub async fn current_user(store: &dyn SessionStore) -> Result<Option<CurrentUser>, SessionError> {
    get_json(store, keys::CURRENT_USER).await
}

/// Record the signed-in user and (optionally) their bearer token.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn sign_in(
    store: &dyn SessionStore,
    user: &CurrentUser,
    token: Option<String>,
) -> Result<(), SessionError> {
    set_json(store, keys::CURRENT_USER, user).await?;
    match token {
        Some(token) => store.set(keys::USER_TOKEN, token).await?,
        None => store.remove(keys::USER_TOKEN).await?,
    }
    debug!(user_id = %user.id, "Signed in");
    Ok(())
}

/// Forget the signed-in user and token.
///
/// A pending cart-clear marker survives so it can be retried on the next sign-in.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn sign_out(store: &dyn SessionStore) -> Result<(), SessionError> {
    store.remove(keys::CURRENT_USER).await?;
    store.remove(keys::USER_TOKEN).await
}

// =============================================================================
// In-memory store
// =============================================================================

/// Session held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// Session persisted as a flat JSON object in a file.
///
/// Every write rewrites the whole file. A missing file reads as an empty session.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| SessionError::Corrupt {
                key: self.path.display().to_string(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, values: &HashMap<String, String>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(values)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value);
        self.save(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_none() {
            return Ok(());
        }
        if let Err(e) = self.save(&values).await {
            warn!(path = %self.path.display(), error = %e, "Failed to persist session");
            return Err(e);
        }
        Ok(())
    }
}
