//! Business logic services.
//!
//! # Services
//!
//! - `store_integration` - Connect, disconnect and sync third-party stores
//! - `sync_worker` - Background queue running initial syncs with retries

pub mod store_integration;
pub mod sync_worker;

pub use store_integration::{ConnectedStore, IntegrationError, StoreIntegrationService};
pub use sync_worker::{RetryPolicy, SyncJob, SyncJobs, SyncQueue, SyncWorker};
