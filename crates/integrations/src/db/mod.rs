//! Persistence for store connections, sync history and synced entities.
//!
//! # Tables
//!
//! - `platform_configs` - Platform descriptors loaded by the adapter factory
//! - `store_connections` - One row per user/store link (never hard-deleted)
//! - `sync_history` - Append-only record of sync runs
//! - `synced_products` / `synced_orders` / `synced_customers` - Normalized
//!   entities keyed by `(user_id, store_connection_id, platform_*_id)`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/integrations/migrations/` and run via:
//! ```bash
//! cargo run -p socialspark-cli -- migrate
//! ```
//!
//! [`IntegrationStore`] has two implementations: [`PgIntegrationStore`] for
//! production and [`InMemoryStore`] for tests and local experiments.

mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use socialspark_core::{
    ConnectionId, ConnectionSettings, ConnectionStatus, Customer, NewConnection, Order,
    PlatformConfig, Product, StoreConnection, SyncCompletion, SyncHistory, SyncHistoryId,
    SyncScope, SyncStatus, SyncType, SyncedCounts, SyncedCustomer, SyncedOrder, SyncedProduct,
    UserId,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::InMemoryStore;
pub use postgres::PgIntegrationStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Record rejected before reaching storage.
    #[error("invalid record: {0}")]
    Invalid(String),
}

/// Storage operations used by the factory, the integration service and the CLI.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    // Platform configs

    /// Every stored descriptor, active or not.
    async fn load_platform_configs(&self) -> Result<Vec<PlatformConfig>, RepositoryError>;

    async fn upsert_platform_config(&self, config: &PlatformConfig) -> Result<(), RepositoryError>;

    // Connections

    async fn insert_connection(
        &self,
        connection: NewConnection,
    ) -> Result<StoreConnection, RepositoryError>;

    async fn get_connection(
        &self,
        id: ConnectionId,
    ) -> Result<Option<StoreConnection>, RepositoryError>;

    /// Connection `id` if it belongs to `user_id`, in any status.
    async fn get_user_connection(
        &self,
        user_id: UserId,
        id: ConnectionId,
    ) -> Result<Option<StoreConnection>, RepositoryError>;

    /// All of a user's connections, newest first.
    async fn list_user_connections(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreConnection>, RepositoryError>;

    async fn update_connection_status(
        &self,
        id: ConnectionId,
        connection_status: ConnectionStatus,
        sync_status: SyncStatus,
    ) -> Result<(), RepositoryError>;

    /// Atomically move `sync_status` from `idle` to `syncing`.
    ///
    /// Returns `false` when the connection was not idle.
    async fn try_begin_sync(&self, id: ConnectionId) -> Result<bool, RepositoryError>;

    async fn set_sync_status(
        &self,
        id: ConnectionId,
        sync_status: SyncStatus,
    ) -> Result<(), RepositoryError>;

    async fn touch_last_sync(
        &self,
        id: ConnectionId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn update_settings(
        &self,
        id: ConnectionId,
        settings: &ConnectionSettings,
    ) -> Result<StoreConnection, RepositoryError>;

    // Sync history

    /// Append a `running` history row.
    async fn insert_sync_history(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        sync_types: &[SyncType],
        started_at: DateTime<Utc>,
    ) -> Result<SyncHistory, RepositoryError>;

    async fn complete_sync_history(
        &self,
        id: SyncHistoryId,
        completion: &SyncCompletion,
    ) -> Result<(), RepositoryError>;

    /// Most recent runs first.
    async fn list_sync_history(
        &self,
        connection_id: ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncHistory>, RepositoryError>;

    // Synced entities

    /// Insert or replace by `(user, connection, platform_product_id)`.
    async fn upsert_product(&self, scope: SyncScope, product: &Product)
    -> Result<(), RepositoryError>;

    /// Insert or replace by `(user, connection, platform_order_id)`.
    async fn upsert_order(&self, scope: SyncScope, order: &Order) -> Result<(), RepositoryError>;

    /// Insert or replace by `(user, connection, platform_customer_id)`.
    async fn upsert_customer(
        &self,
        scope: SyncScope,
        customer: &Customer,
    ) -> Result<(), RepositoryError>;

    /// Most recently synced first.
    async fn list_synced_products(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedProduct>, RepositoryError>;

    async fn list_synced_orders(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedOrder>, RepositoryError>;

    async fn list_synced_customers(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedCustomer>, RepositoryError>;

    async fn count_synced(&self, scope: SyncScope) -> Result<SyncedCounts, RepositoryError>;
}

/// Reject an upsert whose platform id is blank.
fn require_platform_id(kind: &str, id: &str) -> Result<(), RepositoryError> {
    if id.trim().is_empty() {
        return Err(RepositoryError::Invalid(format!("{kind} has an empty platform id")));
    }
    Ok(())
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
