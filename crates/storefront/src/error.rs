//! Unified error type and user-facing notices.
//!
//! Every failure a front-end can hit converts into [`StorefrontError`], which
//! maps to exactly one [`Notice`]: field-scoped messages, a blocking message,
//! or the distinct "cannot reach server" notice.

use thiserror::Error;

use crate::api::{ApiError, FieldErrors};
use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::session::SessionError;

/// How a failure is presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Messages attached to individual form fields.
    Fields(FieldErrors),
    /// A dismissible message that blocks the current action.
    Blocking(String),
    /// No response was received; the action can be retried.
    NetworkUnreachable,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fields(fields) => write!(f, "Please check: {fields}"),
            Self::Blocking(message) => f.write_str(message),
            Self::NetworkUnreachable => f.write_str("Cannot reach the server. Please try again."),
        }
    }
}

/// Any storefront failure.
#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The action needs a signed-in user.
    #[error("Please sign in first")]
    SignedOut,

    /// A value entered by the user was rejected before any request.
    #[error("{0}")]
    InvalidInput(String),

    /// Writing command output failed.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorefrontError {
    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::Checkout(e) => e.notice(),
            Self::Api(e) | Self::Cart(CartError::Api(e)) => api_notice(e),
            other => Notice::Blocking(other.to_string()),
        }
    }

    /// Whether this failure should be reported to error tracking.
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            Self::Session(_)
                | Self::Io(_)
                | Self::Api(ApiError::Parse(_) | ApiError::Http(_))
                | Self::Cart(CartError::Session(_))
                | Self::Checkout(CheckoutError::Session(_))
        )
    }
}

/// Notice for a remote failure.
pub(crate) fn api_notice(err: &ApiError) -> Notice {
    match err {
        ApiError::FieldErrors(fields) => Notice::Fields(fields.clone()),
        e if e.is_unreachable() => Notice::NetworkUnreachable,
        ApiError::Rejected { message, .. } | ApiError::NotFound(message) => {
            Notice::Blocking(message.clone())
        }
        other => Notice::Blocking(other.to_string()),
    }
}
