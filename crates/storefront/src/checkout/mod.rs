//! Three-stage checkout: Shipping, Payment, Completed.
//!
//! # Architecture
//!
//! - [`ShippingForm`] validates contact details locally before anything is sent
//! - [`CheckoutPipeline`] creates the order from the cart lines captured when
//!   checkout began, then clears the cart once payment is confirmed
//! - Order creation and cart clearing are independent calls; a failed clear
//!   is retried on its own and never re-creates the order

mod form;
mod pipeline;

pub use form::{ShippingField, ShippingForm, ShippingMethod, is_valid_phone};
pub use pipeline::{CheckoutPipeline, PaymentMethod, Stage};

use thiserror::Error;

use crate::api::{ApiError, FieldErrors};
use crate::error::{Notice, api_notice};
use crate::session::SessionError;

/// Errors from checkout transitions.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Local validation failed; nothing was sent.
    #[error("Please correct the highlighted fields: {0}")]
    Validation(FieldErrors),

    #[error("There are no items in this order")]
    EmptyOrder,

    #[error("Checkout has not been started")]
    NotStarted,

    #[error("Not allowed in the {actual} stage (expected {expected})")]
    WrongStage { expected: Stage, actual: Stage },

    /// The same action is already in flight.
    #[error("Already submitting, please wait")]
    AlreadyPending,

    #[error("Please accept the terms and conditions")]
    TermsNotAccepted,

    #[error("Please choose a payment method")]
    NoPaymentMethod,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CheckoutError {
    /// How the failure should be shown to the user.
    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::Validation(fields) => Notice::Fields(fields.clone()),
            Self::Api(e) => api_notice(e),
            other => Notice::Blocking(other.to_string()),
        }
    }
}
