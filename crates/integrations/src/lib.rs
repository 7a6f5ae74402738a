//! SocialSpark store integrations library.
//!
//! Connects users' third-party storefronts (Shopify, WooCommerce, Magento
//! and custom REST backends), normalizes their catalogs into the shared
//! model from `socialspark-core`, and keeps local copies in sync.
//!
//! # Layers
//!
//! - [`platforms`] - One adapter per platform plus the adapter factory
//! - [`crypto`] - Credential encryption at rest
//! - [`db`] - Connection, history and synced-entity storage
//! - [`services`] - Connection lifecycle, sync algorithm, background worker
//! - [`api`] - Envelope-returning façade used by the HTTP routes
//! - [`routes`] - axum handlers
//!
//! # Security
//!
//! Platform credentials are encrypted before they reach storage and never
//! appear in `Debug` output or API responses.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod middleware;
pub mod platforms;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use config::SyncWorkerConfig;
use crypto::CredentialCipher;
use db::IntegrationStore;
use platforms::{AdapterFactory, AdapterRegistry, ApiClient, FactoryError};
use services::{StoreIntegrationService, SyncQueue, SyncWorker};

/// Initialize the adapter factory and wire the service to a sync worker.
///
/// The returned worker must be spawned (`tokio::spawn(worker.run())`) for
/// queued syncs to run.
///
/// # Errors
///
/// Returns `FactoryError::Repository` if platform configs cannot be loaded.
pub async fn build_service(
    store: Arc<dyn IntegrationStore>,
    registry: AdapterRegistry,
    http: ApiClient,
    cipher: CredentialCipher,
    api_base_url: &str,
    worker_config: SyncWorkerConfig,
) -> Result<(Arc<StoreIntegrationService>, SyncWorker), FactoryError> {
    let factory = Arc::new(AdapterFactory::new(registry, Arc::clone(&store), http));
    factory.initialize().await?;

    let (queue, jobs) = SyncQueue::channel();
    let service = Arc::new(StoreIntegrationService::new(
        store,
        factory,
        cipher,
        api_base_url,
        queue,
    ));
    let worker = SyncWorker::new(Arc::downgrade(&service), jobs, worker_config);
    Ok((service, worker))
}
