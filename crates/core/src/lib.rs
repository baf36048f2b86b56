//! Marigold Core - Shared types library.
//!
//! This crate provides common types used across all Marigold components:
//! - `storefront` - Cart synchronization and checkout client library
//! - `cli` - Terminal front-end driving the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
