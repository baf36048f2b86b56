//! Marigold storefront client library.
//!
//! Keeps a client-side cart consistent with the remote service under
//! optimistic edits, and drives the shipping/payment/completion checkout that
//! turns the selected cart lines into an order.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod orders;
pub mod session;
pub mod state;
pub mod wishlist;

pub use error::{Notice, StorefrontError};
pub use state::Storefront;
