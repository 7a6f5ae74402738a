//! Store integration service.
//!
//! Owns the connection lifecycle and the sync algorithm:
//!
//! 1. `connect_store` validates credentials against the platform, encrypts
//!    them, persists a connection and queues an initial sync
//! 2. `sync_store_data` claims the connection (`idle` → `syncing`), fetches
//!    each requested entity type and upserts item by item, recording partial
//!    failures in sync history
//! 3. `disconnect_store` flips the connection to `disconnected`; synced data
//!    is kept

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use socialspark_core::{
    ConnectionId, ConnectionSettings, ConnectionStatus, CredentialsError, NewConnection,
    PlatformCredentials, PlatformType, StoreConnection, StoreInfo, SyncCompletion, SyncHistory,
    SyncOptions, SyncResult, SyncRunStatus, SyncScope, SyncStatus, SyncType, SyncedCounts,
    SyncedCustomer, SyncedOrder, SyncedProduct, UnsupportedPlatform, UserId, features,
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::sync_worker::{SyncJob, SyncQueue};
use crate::crypto::{CredentialCipher, CryptoError};
use crate::db::{IntegrationStore, RepositoryError};
use crate::platforms::{AdapterError, AdapterFactory, FactoryError, PlatformAdapter};

/// Errors returned by [`StoreIntegrationService`].
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    /// The platform rejected the credentials during validation.
    #[error("Invalid credentials for the selected platform")]
    InvalidCredentials,

    /// The credential bag is missing a field or has the wrong shape.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// No connection with this id is owned by the caller.
    #[error("Store connection not found")]
    NotFound,

    #[error("Store connection is not connected")]
    NotConnected,

    #[error("Sync already in progress")]
    SyncInProgress,

    /// An inbound webhook failed signature verification.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Platform error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Credential encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Factory(FactoryError),
}

impl From<FactoryError> for IntegrationError {
    fn from(err: FactoryError) -> Self {
        match err {
            FactoryError::Unsupported(e) => Self::UnsupportedPlatform(e),
            other => Self::Factory(other),
        }
    }
}

impl IntegrationError {
    /// Whether a later attempt could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Adapter(e) => e.is_transient(),
            Self::Repository(RepositoryError::Database(_))
            | Self::Factory(FactoryError::Repository(_) | FactoryError::NotInitialized) => true,
            _ => false,
        }
    }

    /// Whether this is a caller mistake rather than a server fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform(_)
                | Self::InvalidCredentials
                | Self::Credentials(_)
                | Self::NotFound
                | Self::NotConnected
                | Self::SyncInProgress
                | Self::InvalidSignature
        )
    }
}

/// A freshly connected store.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedStore {
    pub connection: StoreConnection,
    pub store_info: StoreInfo,
}

/// Running totals for one sync run.
#[derive(Debug, Default)]
struct SyncTally {
    synced: u32,
    failed: u32,
    errors: Vec<String>,
}

impl SyncTally {
    fn record(&mut self, kind: &str, platform_id: &str, outcome: Result<(), RepositoryError>) {
        match outcome {
            Ok(()) => self.synced = self.synced.saturating_add(1),
            Err(e) => {
                debug!(kind, platform_id, error = %e, "Item upsert failed");
                self.failed = self.failed.saturating_add(1);
                self.errors.push(format!("Failed to sync {kind} {platform_id}: {e}"));
            }
        }
    }

    fn fetch_failed(&mut self, sync_type: SyncType, err: &AdapterError) {
        warn!(%sync_type, error = %err, "Fetch failed; continuing with remaining types");
        self.errors.push(format!("Failed to fetch {sync_type}: {err}"));
    }

    fn status(&self) -> SyncRunStatus {
        SyncRunStatus::from_counts(self.synced, self.failed, self.errors.len())
    }

    fn error_message(&self) -> Option<String> {
        (!self.errors.is_empty()).then(|| self.errors.join("; "))
    }
}

/// Connection lifecycle and sync orchestration.
///
/// Constructed once at startup and shared behind an `Arc`.
pub struct StoreIntegrationService {
    store: Arc<dyn IntegrationStore>,
    factory: Arc<AdapterFactory>,
    cipher: CredentialCipher,
    api_base_url: String,
    sync_queue: SyncQueue,
}

impl std::fmt::Debug for StoreIntegrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreIntegrationService")
            .field("factory", &self.factory)
            .field("cipher", &self.cipher)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl StoreIntegrationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        factory: Arc<AdapterFactory>,
        cipher: CredentialCipher,
        api_base_url: impl Into<String>,
        sync_queue: SyncQueue,
    ) -> Self {
        Self {
            store,
            factory,
            cipher,
            api_base_url: api_base_url.into(),
            sync_queue,
        }
    }

    #[must_use]
    pub fn factory(&self) -> &AdapterFactory {
        &self.factory
    }

    /// Callback URL registered with the platform for `connection_id`.
    #[must_use]
    pub fn webhook_url(&self, platform: PlatformType, connection_id: ConnectionId) -> String {
        format!(
            "{}/webhooks/{platform}/{connection_id}",
            self.api_base_url.trim_end_matches('/')
        )
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Validate `credentials` against `platform`, persist a new connection and
    /// queue its initial sync.
    ///
    /// # Errors
    ///
    /// - `UnsupportedPlatform` when the platform has no active adapter
    /// - `Credentials` when a required field is missing
    /// - `InvalidCredentials` when the platform rejects them; no row is written
    /// - `Adapter` when store info cannot be fetched
    #[instrument(skip_all, fields(%user_id, %platform))]
    pub async fn connect_store(
        &self,
        user_id: UserId,
        platform: PlatformType,
        credentials: Value,
        settings: Option<ConnectionSettings>,
    ) -> Result<ConnectedStore, IntegrationError> {
        let adapter = self.factory.create_adapter(platform).await?;
        let credentials = PlatformCredentials::from_fields(platform, credentials)?;

        if !adapter.validate_credentials(&credentials).await {
            return Err(IntegrationError::InvalidCredentials);
        }

        let store_info = adapter.get_store_info(&credentials).await?;
        let encrypted_credentials = self.cipher.encrypt(&credentials)?;
        let settings = settings.unwrap_or_default();

        let connection = self
            .store
            .insert_connection(NewConnection {
                user_id,
                platform,
                store_name: store_info.name.clone(),
                store_domain: store_info.domain.clone(),
                store_currency: store_info.currency.clone(),
                store_timezone: store_info.timezone.clone(),
                store_metadata: store_info.metadata.clone(),
                encrypted_credentials,
                settings,
                last_sync_at: Some(Utc::now()),
            })
            .await?;

        info!(connection_id = %connection.id, store = %connection.store_name, "Store connected");

        if self.factory.supports_feature(platform, features::WEBHOOKS).await {
            let url = self.webhook_url(platform, connection.id);
            if let Err(e) = adapter.setup_webhooks(&credentials, &url).await {
                warn!(connection_id = %connection.id, error = %e, "Webhook setup failed");
            }
        }

        self.enqueue_sync(connection.id, connection.settings.sync_types.clone());

        Ok(ConnectedStore {
            connection,
            store_info,
        })
    }

    /// Mark a connection disconnected. Synced data is kept.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the connection does not exist, belongs to
    /// another user, or is already disconnected.
    #[instrument(skip_all, fields(%user_id, %connection_id))]
    pub async fn disconnect_store(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<(), IntegrationError> {
        let connection = self
            .store
            .get_user_connection(user_id, connection_id)
            .await?
            .filter(StoreConnection::is_connected)
            .ok_or(IntegrationError::NotFound)?;

        if self
            .factory
            .supports_feature(connection.platform, features::WEBHOOKS)
            .await
        {
            self.remove_webhooks(&connection).await;
        }

        self.store
            .update_connection_status(
                connection_id,
                ConnectionStatus::Disconnected,
                SyncStatus::Idle,
            )
            .await?;

        info!("Store disconnected");
        Ok(())
    }

    async fn remove_webhooks(&self, connection: &StoreConnection) {
        let outcome = async {
            let credentials = self.credentials_for(connection)?;
            let adapter = self.factory.create_adapter(connection.platform).await?;
            adapter.remove_webhooks(&credentials).await?;
            Ok::<_, IntegrationError>(())
        }
        .await;
        if let Err(e) = outcome {
            warn!(connection_id = %connection.id, error = %e, "Webhook removal failed");
        }
    }

    /// Queue a background sync. Returns `false` when the worker is gone.
    pub fn enqueue_sync(&self, connection_id: ConnectionId, sync_types: Vec<SyncType>) -> bool {
        let queued = self.sync_queue.enqueue(SyncJob {
            connection_id,
            sync_types,
        });
        if !queued {
            warn!(%connection_id, "Sync worker unavailable; initial sync not queued");
        }
        queued
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Fetch and upsert `sync_types` for a connection.
    ///
    /// An empty `sync_types` uses the connection's configured types. Item
    /// failures and per-type fetch failures are counted, not raised. The
    /// connection is always returned to `idle`.
    ///
    /// # Errors
    ///
    /// - `NotFound` / `NotConnected` for a missing or disconnected connection
    /// - `SyncInProgress` when another sync holds the connection
    /// - `Crypto` / `Factory` / `Repository` when the run cannot start; the
    ///   history row is marked failed first
    #[instrument(skip(self, options))]
    pub async fn sync_store_data(
        &self,
        connection_id: ConnectionId,
        sync_types: &[SyncType],
        options: SyncOptions,
    ) -> Result<SyncResult, IntegrationError> {
        let connection = self
            .store
            .get_connection(connection_id)
            .await?
            .ok_or(IntegrationError::NotFound)?;
        if !connection.is_connected() {
            return Err(IntegrationError::NotConnected);
        }

        if !self.store.try_begin_sync(connection_id).await? {
            return Err(IntegrationError::SyncInProgress);
        }

        let sync_types = if sync_types.is_empty() {
            connection.settings.sync_types.clone()
        } else {
            sync_types.to_vec()
        };

        let result = self.run_sync(&connection, &sync_types, options).await;

        if let Err(e) = self.store.set_sync_status(connection_id, SyncStatus::Idle).await {
            error!(error = %e, "Failed to reset sync status");
        }
        result
    }

    async fn run_sync(
        &self,
        connection: &StoreConnection,
        sync_types: &[SyncType],
        options: SyncOptions,
    ) -> Result<SyncResult, IntegrationError> {
        let history = self
            .store
            .insert_sync_history(connection.id, connection.user_id, sync_types, Utc::now())
            .await?;

        let tally = match self.sync_entities(connection, sync_types, options).await {
            Ok(tally) => tally,
            Err(e) => {
                let completion = SyncCompletion {
                    status: SyncRunStatus::Failed,
                    items_synced: 0,
                    items_failed: 0,
                    error_message: Some(e.to_string()),
                    completed_at: Utc::now(),
                };
                if let Err(history_err) =
                    self.store.complete_sync_history(history.id, &completion).await
                {
                    error!(error = %history_err, "Failed to record sync failure");
                }
                return Err(e);
            }
        };

        let status = tally.status();
        let completed_at = Utc::now();
        let completion = SyncCompletion {
            status,
            items_synced: tally.synced,
            items_failed: tally.failed,
            error_message: tally.error_message(),
            completed_at,
        };
        // Entities are already stored, so a bookkeeping failure is logged
        // and the result still returned.
        if let Err(e) = self.store.complete_sync_history(history.id, &completion).await {
            error!(sync_history_id = %history.id, error = %e, "Failed to record sync completion");
        }
        if let Err(e) = self.store.touch_last_sync(connection.id, completed_at).await {
            error!(error = %e, "Failed to record last sync time");
        }

        info!(
            %status,
            items_synced = tally.synced,
            items_failed = tally.failed,
            "Sync finished"
        );

        Ok(SyncResult {
            success: status == SyncRunStatus::Success,
            items_synced: tally.synced,
            items_failed: tally.failed,
            errors: tally.errors,
            sync_history_id: history.id,
        })
    }

    async fn sync_entities(
        &self,
        connection: &StoreConnection,
        sync_types: &[SyncType],
        options: SyncOptions,
    ) -> Result<SyncTally, IntegrationError> {
        let credentials = self.credentials_for(connection)?;
        let adapter = self.factory.create_adapter(connection.platform).await?;
        let scope = SyncScope {
            user_id: connection.user_id,
            connection_id: connection.id,
        };

        let mut tally = SyncTally::default();
        for &sync_type in sync_types {
            self.sync_one_type(
                adapter.as_ref(),
                &credentials,
                scope,
                sync_type,
                &options,
                &mut tally,
            )
            .await;
        }
        Ok(tally)
    }

    async fn sync_one_type(
        &self,
        adapter: &dyn PlatformAdapter,
        credentials: &PlatformCredentials,
        scope: SyncScope,
        sync_type: SyncType,
        options: &SyncOptions,
        tally: &mut SyncTally,
    ) {
        match sync_type {
            SyncType::Products => match adapter.get_products(credentials, options).await {
                Ok(products) => {
                    for product in &products {
                        let outcome = self.store.upsert_product(scope, product).await;
                        tally.record("product", &product.platform_product_id, outcome);
                    }
                }
                Err(e) => tally.fetch_failed(sync_type, &e),
            },
            SyncType::Orders => match adapter.get_orders(credentials, options).await {
                Ok(orders) => {
                    for order in &orders {
                        let outcome = self.store.upsert_order(scope, order).await;
                        tally.record("order", &order.platform_order_id, outcome);
                    }
                }
                Err(e) => tally.fetch_failed(sync_type, &e),
            },
            SyncType::Customers => match adapter.get_customers(credentials, options).await {
                Ok(customers) => {
                    for customer in &customers {
                        let outcome = self.store.upsert_customer(scope, customer).await;
                        tally.record("customer", &customer.platform_customer_id, outcome);
                    }
                }
                Err(e) => tally.fetch_failed(sync_type, &e),
            },
        }
    }

    fn credentials_for(
        &self,
        connection: &StoreConnection,
    ) -> Result<PlatformCredentials, IntegrationError> {
        Ok(self.cipher.decrypt(&connection.encrypted_credentials)?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every connection owned by `user_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    pub async fn get_user_connections(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreConnection>, IntegrationError> {
        Ok(self.store.list_user_connections(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` unless `user_id` owns the connection.
    pub async fn get_connection(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<StoreConnection, IntegrationError> {
        self.store
            .get_user_connection(user_id, connection_id)
            .await?
            .ok_or(IntegrationError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `NotFound` unless `user_id` owns the connection.
    #[instrument(skip_all, fields(%user_id, %connection_id))]
    pub async fn update_connection_settings(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        settings: ConnectionSettings,
    ) -> Result<StoreConnection, IntegrationError> {
        self.get_connection(user_id, connection_id).await?;
        Ok(self.store.update_settings(connection_id, &settings).await?)
    }

    /// Probe the platform with the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless `user_id` owns the connection, and `Crypto`
    /// if the stored credentials cannot be decrypted.
    #[instrument(skip_all, fields(%user_id, %connection_id))]
    pub async fn test_connection(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<bool, IntegrationError> {
        let connection = self.get_connection(user_id, connection_id).await?;
        let credentials = self.credentials_for(&connection)?;
        let adapter = self.factory.create_adapter(connection.platform).await?;
        Ok(adapter.test_connection(&credentials).await)
    }

    /// Verify an inbound webhook delivery for `connection_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown connection, a platform mismatch, or a
    /// platform that does not advertise webhooks. Adapters without webhook
    /// support cannot check signatures, so their deliveries are never trusted.
    pub async fn verify_webhook(
        &self,
        platform: PlatformType,
        connection_id: ConnectionId,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<bool, IntegrationError> {
        if !self.factory.supports_feature(platform, features::WEBHOOKS).await {
            tracing::warn!(
                %platform,
                %connection_id,
                "Webhook for platform without webhook support"
            );
            return Err(IntegrationError::NotFound);
        }
        let connection = self
            .store
            .get_connection(connection_id)
            .await?
            .filter(|c| c.platform == platform && c.is_connected())
            .ok_or(IntegrationError::NotFound)?;
        let credentials = self.credentials_for(&connection)?;
        let adapter = self.factory.create_adapter(platform).await?;
        Ok(adapter.validate_webhook(&credentials, payload, signature))
    }

    /// Recent sync runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless `user_id` owns the connection.
    pub async fn get_sync_history(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncHistory>, IntegrationError> {
        self.get_connection(user_id, connection_id).await?;
        Ok(self.store.list_sync_history(connection_id, limit).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` unless `user_id` owns the connection.
    pub async fn get_synced_products(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncedProduct>, IntegrationError> {
        let scope = self.owned_scope(user_id, connection_id).await?;
        Ok(self.store.list_synced_products(scope, limit).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` unless `user_id` owns the connection.
    pub async fn get_synced_orders(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncedOrder>, IntegrationError> {
        let scope = self.owned_scope(user_id, connection_id).await?;
        Ok(self.store.list_synced_orders(scope, limit).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` unless `user_id` owns the connection.
    pub async fn get_synced_customers(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncedCustomer>, IntegrationError> {
        let scope = self.owned_scope(user_id, connection_id).await?;
        Ok(self.store.list_synced_customers(scope, limit).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` unless `user_id` owns the connection.
    pub async fn get_synced_counts(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<SyncedCounts, IntegrationError> {
        let scope = self.owned_scope(user_id, connection_id).await?;
        Ok(self.store.count_synced(scope).await?)
    }

    async fn owned_scope(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<SyncScope, IntegrationError> {
        let connection = self.get_connection(user_id, connection_id).await?;
        Ok(SyncScope {
            user_id: connection.user_id,
            connection_id: connection.id,
        })
    }
}
