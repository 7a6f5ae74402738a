//! Envelope-returning wrapper over [`StoreIntegrationService`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use socialspark_core::{
    ConnectionId, ConnectionSettings, PlatformConfig, PlatformType, StoreConnection, SyncHistory,
    SyncOptions, SyncResult, SyncRunStatus, SyncType, SyncedCounts, SyncedCustomer, SyncedOrder,
    SyncedProduct, UnsupportedPlatform, UserId,
};
use tracing::{info, instrument};

use super::forms::{FormField, form_fields};
use super::ApiResponse;
use crate::services::{ConnectedStore, IntegrationError, StoreIntegrationService};

/// Sync runs considered by [`StoreIntegrationApi::get_connection_stats`].
const RECENT_SYNC_LIMIT: u32 = 10;

/// Outcome for one connection in a bulk sync.
#[derive(Debug, Clone, Serialize)]
pub struct BulkSyncItem {
    pub connection_id: ConnectionId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SyncResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of [`StoreIntegrationApi::bulk_sync`].
#[derive(Debug, Clone, Serialize)]
pub struct BulkSyncReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BulkSyncItem>,
}

/// Dashboard summary for one connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub connection: StoreConnection,
    pub counts: SyncedCounts,
    pub recent_syncs: Vec<SyncHistory>,
    /// Percentage of recent finished runs that fully succeeded.
    pub success_rate: f64,
    pub last_sync_at: Option<DateTime<Utc>>,
}

fn success_rate(history: &[SyncHistory]) -> f64 {
    let finished: Vec<_> = history
        .iter()
        .filter(|h| h.status != SyncRunStatus::Running)
        .collect();
    if finished.is_empty() {
        return 0.0;
    }
    let successful = finished
        .iter()
        .filter(|h| h.status == SyncRunStatus::Success)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let rate = successful as f64 / finished.len() as f64 * 100.0;
    rate
}

/// API façade over the integration service.
#[derive(Debug, Clone)]
pub struct StoreIntegrationApi {
    service: Arc<StoreIntegrationService>,
    bulk_sync_concurrency: usize,
}

impl StoreIntegrationApi {
    #[must_use]
    pub fn new(service: Arc<StoreIntegrationService>, bulk_sync_concurrency: usize) -> Self {
        Self {
            service,
            bulk_sync_concurrency: bulk_sync_concurrency.max(1),
        }
    }

    #[must_use]
    pub const fn service(&self) -> &Arc<StoreIntegrationService> {
        &self.service
    }

    // =========================================================================
    // Connections
    // =========================================================================

    pub async fn connect_store(
        &self,
        user_id: UserId,
        platform: &str,
        credentials: Value,
        settings: Option<ConnectionSettings>,
    ) -> ApiResponse<ConnectedStore> {
        const FAILED: &str = "Failed to connect store";
        let platform = match platform.parse::<PlatformType>() {
            Ok(platform) => platform,
            Err(e) => return ApiResponse::fail(&e.into(), FAILED),
        };
        ApiResponse::from_result(
            self.service
                .connect_store(user_id, platform, credentials, settings)
                .await,
            "Store connected successfully",
            FAILED,
        )
    }

    pub async fn disconnect_store(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> ApiResponse<()> {
        ApiResponse::from_result(
            self.service.disconnect_store(user_id, connection_id).await,
            "Store disconnected successfully",
            "Failed to disconnect store",
        )
    }

    pub async fn get_user_connections(&self, user_id: UserId) -> ApiResponse<Vec<StoreConnection>> {
        ApiResponse::from_result(
            self.service.get_user_connections(user_id).await,
            "Connections retrieved successfully",
            "Failed to load connections",
        )
    }

    pub async fn get_connection(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> ApiResponse<StoreConnection> {
        ApiResponse::from_result(
            self.service.get_connection(user_id, connection_id).await,
            "Connection retrieved successfully",
            "Failed to load connection",
        )
    }

    pub async fn update_connection_settings(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        settings: ConnectionSettings,
    ) -> ApiResponse<StoreConnection> {
        ApiResponse::from_result(
            self.service
                .update_connection_settings(user_id, connection_id, settings)
                .await,
            "Settings updated successfully",
            "Failed to update settings",
        )
    }

    pub async fn test_connection(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> ApiResponse<bool> {
        match self.service.test_connection(user_id, connection_id).await {
            Ok(true) => ApiResponse::ok(true, "Connection successful"),
            Ok(false) => ApiResponse::ok(false, "Connection failed"),
            Err(e) => ApiResponse::fail(&e, "Failed to test connection"),
        }
    }

    // =========================================================================
    // Sync
    // =========================================================================

    pub async fn sync_store_data(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        sync_types: &[SyncType],
        options: SyncOptions,
    ) -> ApiResponse<SyncResult> {
        ApiResponse::from_result(
            self.owned_sync(user_id, connection_id, sync_types, options).await,
            "Sync completed",
            "Sync failed",
        )
    }

    async fn owned_sync(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        sync_types: &[SyncType],
        options: SyncOptions,
    ) -> Result<SyncResult, IntegrationError> {
        self.service.get_connection(user_id, connection_id).await?;
        self.service
            .sync_store_data(connection_id, sync_types, options)
            .await
    }

    /// Sync several connections with bounded concurrency.
    ///
    /// One connection failing never stops the others.
    #[instrument(skip_all, fields(%user_id, connections = connection_ids.len()))]
    pub async fn bulk_sync(
        &self,
        user_id: UserId,
        connection_ids: Vec<ConnectionId>,
        sync_types: &[SyncType],
    ) -> ApiResponse<BulkSyncReport> {
        let results: Vec<BulkSyncItem> = stream::iter(connection_ids)
            .map(|connection_id| async move {
                match self
                    .owned_sync(user_id, connection_id, sync_types, SyncOptions::default())
                    .await
                {
                    Ok(result) => BulkSyncItem {
                        connection_id,
                        success: result.success,
                        result: Some(result),
                        error: None,
                    },
                    Err(e) => BulkSyncItem {
                        connection_id,
                        success: false,
                        result: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .buffer_unordered(self.bulk_sync_concurrency)
            .collect()
            .await;

        let successful = results.iter().filter(|r| r.success).count();
        let report = BulkSyncReport {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        };
        info!(successful = report.successful, failed = report.failed, "Bulk sync finished");

        let message = format!(
            "Bulk sync completed: {} successful, {} failed",
            report.successful, report.failed
        );
        ApiResponse::ok(report, message)
    }

    pub async fn get_sync_history(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        limit: u32,
    ) -> ApiResponse<Vec<SyncHistory>> {
        ApiResponse::from_result(
            self.service
                .get_sync_history(user_id, connection_id, limit)
                .await,
            "Sync history retrieved successfully",
            "Failed to load sync history",
        )
    }

    pub async fn get_synced_products(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        limit: u32,
    ) -> ApiResponse<Vec<SyncedProduct>> {
        ApiResponse::from_result(
            self.service
                .get_synced_products(user_id, connection_id, limit)
                .await,
            "Products retrieved successfully",
            "Failed to load products",
        )
    }

    pub async fn get_synced_orders(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        limit: u32,
    ) -> ApiResponse<Vec<SyncedOrder>> {
        ApiResponse::from_result(
            self.service
                .get_synced_orders(user_id, connection_id, limit)
                .await,
            "Orders retrieved successfully",
            "Failed to load orders",
        )
    }

    pub async fn get_synced_customers(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        limit: u32,
    ) -> ApiResponse<Vec<SyncedCustomer>> {
        ApiResponse::from_result(
            self.service
                .get_synced_customers(user_id, connection_id, limit)
                .await,
            "Customers retrieved successfully",
            "Failed to load customers",
        )
    }

    /// Connection, entity counts and recent history, loaded in parallel.
    pub async fn get_connection_stats(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> ApiResponse<ConnectionStats> {
        let result = tokio::try_join!(
            self.service.get_connection(user_id, connection_id),
            self.service.get_synced_counts(user_id, connection_id),
            self.service
                .get_sync_history(user_id, connection_id, RECENT_SYNC_LIMIT),
        )
        .map(|(connection, counts, recent_syncs)| ConnectionStats {
            success_rate: success_rate(&recent_syncs),
            last_sync_at: connection.last_sync_at,
            connection,
            counts,
            recent_syncs,
        });
        ApiResponse::from_result(
            result,
            "Stats retrieved successfully",
            "Failed to load connection stats",
        )
    }

    // =========================================================================
    // Webhooks
    // =========================================================================

    /// Verify an inbound webhook and queue a sync for the connection.
    ///
    /// A signature mismatch fails with `Invalid webhook signature` and
    /// queues nothing. `data` reports whether the sync was queued.
    pub async fn handle_webhook(
        &self,
        platform: PlatformType,
        connection_id: ConnectionId,
        payload: &[u8],
        signature: Option<&str>,
    ) -> ApiResponse<bool> {
        match self
            .service
            .verify_webhook(platform, connection_id, payload, signature)
            .await
        {
            Ok(true) => {
                let queued = self.service.enqueue_sync(connection_id, Vec::new());
                ApiResponse::ok(queued, "Webhook accepted")
            }
            Ok(false) => {
                tracing::warn!(%platform, %connection_id, "Webhook signature rejected");
                ApiResponse::fail(&IntegrationError::InvalidSignature, "Failed to handle webhook")
            }
            Err(e) => ApiResponse::fail(&e, "Failed to handle webhook"),
        }
    }

    // =========================================================================
    // Platforms
    // =========================================================================

    pub async fn get_supported_platforms(&self) -> ApiResponse<Vec<PlatformConfig>> {
        let configs = self.service.factory().get_all_platform_configs().await;
        ApiResponse::ok(configs, "Supported platforms retrieved successfully")
    }

    pub async fn get_platform_form_fields(&self, platform: &str) -> ApiResponse<Vec<FormField>> {
        const FAILED: &str = "Failed to load form fields";
        let unsupported = || UnsupportedPlatform(platform.to_string());
        let Ok(parsed) = platform.parse::<PlatformType>() else {
            return ApiResponse::fail(&unsupported().into(), FAILED);
        };
        match self.service.factory().get_platform_config(parsed).await {
            Some(config) => {
                ApiResponse::ok(form_fields(&config), "Form fields retrieved successfully")
            }
            None => ApiResponse::fail(&unsupported().into(), FAILED),
        }
    }
}

#[cfg(test)]
mod tests {
    use socialspark_core::{SyncHistoryId, UserId};

    use super::*;

    fn run(status: SyncRunStatus) -> SyncHistory {
        SyncHistory {
            id: SyncHistoryId::generate(),
            connection_id: ConnectionId::generate(),
            user_id: UserId::generate(),
            sync_types: vec![SyncType::Products],
            status,
            items_synced: 0,
            items_failed: 0,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_success_rate_ignores_running() {
        let history = vec![
            run(SyncRunStatus::Success),
            run(SyncRunStatus::Partial),
            run(SyncRunStatus::Success),
            run(SyncRunStatus::Failed),
            run(SyncRunStatus::Running),
        ];
        assert!((success_rate(&history) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_rate_empty() {
        assert!(success_rate(&[]).abs() < f64::EPSILON);
    }
}
