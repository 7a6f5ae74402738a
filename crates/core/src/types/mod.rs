//! Core types for SocialSpark store integrations.
//!
//! This module provides type-safe wrappers for the common data model all
//! platform adapters map into.

pub mod catalog;
pub mod connection;
pub mod credential;
pub mod id;
pub mod platform;
pub mod status;

pub use catalog::{
    Address, Customer, Metadata, Order, OrderItem, Product, ProductUpdate, ProductVariant,
    StoreInfo,
};
pub use connection::{
    ConnectionSettings, NewConnection, StoreConnection, SyncCompletion, SyncHistory, SyncOptions,
    SyncResult, SyncScope, SyncedCounts, SyncedCustomer, SyncedOrder, SyncedProduct,
};
pub use credential::{
    CredentialsError, CustomCredentials, MagentoCredentials, PlatformCredentials,
    ShopifyCredentials, WooCommerceCredentials,
};
pub use id::*;
pub use platform::{
    AuthMethod, FieldType, PlatformConfig, PlatformType, RateLimits, UnsupportedPlatform,
    builtin_platform_configs, features,
};
pub use status::*;
