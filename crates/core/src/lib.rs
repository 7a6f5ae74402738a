//! SocialSpark Core - Shared store-integration types.
//!
//! This crate provides the platform-agnostic data model used across the
//! SocialSpark store-integration components:
//! - `integrations` - Platform adapters, sync service, and API façade
//! - `cli` - Command-line tools for migrations and manual syncs
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - IDs, statuses, credentials, platform descriptors, and the
//!   normalized Product/Order/Customer model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
