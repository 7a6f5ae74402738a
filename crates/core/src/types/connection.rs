//! Store connections, sync history, and synced-entity records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::catalog::{Customer, Metadata, Order, Product};
use super::id::{ConnectionId, SyncHistoryId, UserId};
use super::platform::PlatformType;
use super::status::{ConnectionStatus, SyncRunStatus, SyncStatus, SyncType};

/// Default interval between automatic syncs.
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 60;

/// Per-connection sync preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub sync_interval_minutes: u32,
    /// Entity types included in automatic and initial syncs.
    pub sync_types: Vec<SyncType>,
    /// Platform field name → SocialSpark field name.
    pub field_mappings: BTreeMap<String, String>,
    pub filters: Map<String, Value>,
    pub auto_sync: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            sync_types: vec![SyncType::Products, SyncType::Orders],
            field_mappings: BTreeMap::new(),
            filters: Map::new(),
            auto_sync: true,
        }
    }
}

/// A user's persisted link to one store on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConnection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub platform: PlatformType,
    pub store_name: String,
    pub store_domain: String,
    pub store_currency: Option<String>,
    pub store_timezone: Option<String>,
    pub store_metadata: Metadata,
    /// Cipher output; never plaintext.
    #[serde(skip_serializing)]
    pub encrypted_credentials: String,
    pub connection_status: ConnectionStatus,
    pub sync_status: SyncStatus,
    pub settings: ConnectionSettings,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoreConnection {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_status == ConnectionStatus::Connected
    }
}

/// Fields needed to create a connection row.
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub user_id: UserId,
    pub platform: PlatformType,
    pub store_name: String,
    pub store_domain: String,
    pub store_currency: Option<String>,
    pub store_timezone: Option<String>,
    pub store_metadata: Metadata,
    pub encrypted_credentials: String,
    pub settings: ConnectionSettings,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// One sync run. Rows are appended and completed, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistory {
    pub id: SyncHistoryId,
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub sync_types: Vec<SyncType>,
    pub status: SyncRunStatus,
    pub items_synced: u32,
    pub items_failed: u32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Final counters written to a sync history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCompletion {
    pub status: SyncRunStatus,
    pub items_synced: u32,
    pub items_failed: u32,
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Options accepted by adapter fetches and sync runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Page-size bound for the single paginated request per entity type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl SyncOptions {
    #[must_use]
    pub const fn with_limit(limit: u32) -> Self {
        Self { limit: Some(limit) }
    }

    /// Effective page size: `limit` or `default`, capped at `max`.
    #[must_use]
    pub fn page_size(&self, default: u32, max: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, max)
    }
}

/// Outcome of `sync_store_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub items_synced: u32,
    pub items_failed: u32,
    pub errors: Vec<String>,
    pub sync_history_id: SyncHistoryId,
}

/// Ownership scope shared by all synced rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncScope {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
}

/// A product row as persisted after a sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedProduct {
    pub user_id: UserId,
    pub store_connection_id: ConnectionId,
    pub product: Product,
    pub synced_at: DateTime<Utc>,
}

/// An order row as persisted after a sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedOrder {
    pub user_id: UserId,
    pub store_connection_id: ConnectionId,
    pub order: Order,
    pub synced_at: DateTime<Utc>,
}

/// A customer row as persisted after a sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedCustomer {
    pub user_id: UserId,
    pub store_connection_id: ConnectionId,
    pub customer: Customer,
    pub synced_at: DateTime<Utc>,
}

/// Row counts of synced entities for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedCounts {
    pub products: u64,
    pub orders: u64,
    pub customers: u64,
}
