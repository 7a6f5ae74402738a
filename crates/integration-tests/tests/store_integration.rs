//! Store integration service: connect, sync, disconnect.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use socialspark_core::{
    ConnectionId, ConnectionSettings, ConnectionStatus, Customer, NewConnection, Order,
    PlatformConfig, PlatformType, Product, StoreConnection, SyncCompletion, SyncHistory,
    SyncHistoryId, SyncOptions, SyncRunStatus, SyncScope, SyncStatus, SyncType, SyncedCounts,
    SyncedCustomer, SyncedOrder, SyncedProduct, UserId,
};
use socialspark_integration_tests::{
    MockAdapter, MockStorefront, TEST_ENCRYPTION_KEY, TestHarness, customer, immediate_worker,
    order, product,
};
use socialspark_integrations::{
    build_service,
    crypto::CredentialCipher,
    db::{InMemoryStore, IntegrationStore, RepositoryError},
    platforms::{AdapterRegistry, ApiClient},
    services::IntegrationError,
};

fn custom_credentials() -> Value {
    json!({"base_url": "https://store.example", "api_key": "key_123"})
}

async fn connect(harness: &TestHarness, user_id: UserId) -> ConnectionId {
    harness
        .service
        .connect_store(user_id, PlatformType::Custom, custom_credentials(), None)
        .await
        .unwrap()
        .connection
        .id
}

/// Eight good products and two the store will refuse.
fn eight_of_ten() -> MockAdapter {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = (1..=8)
        .map(|i| product(PlatformType::Custom, &format!("p{i}")))
        .collect();
    adapter.products.push(product(PlatformType::Custom, ""));
    adapter.products.push(product(PlatformType::Custom, " "));
    adapter
}

// =============================================================================
// Connect
// =============================================================================

#[tokio::test]
async fn test_connect_shopify_store_and_initial_sync() {
    let server = MockStorefront::builder()
        .json(
            "/admin/api/2024-01/shop.json",
            json!({"shop": {"name": "Foo Store", "domain": "foo.myshopify.com", "currency": "USD"}}),
        )
        .json("/admin/api/2024-01/products.json", json!({"products": []}))
        .json("/admin/api/2024-01/orders.json", json!({"orders": []}))
        .start()
        .await;
    let mut harness = TestHarness::new(AdapterRegistry::with_builtin_adapters()).await;
    harness.spawn_worker();
    let user_id = UserId::generate();

    let connected = harness
        .service
        .connect_store(
            user_id,
            PlatformType::Shopify,
            json!({"shop": server.base_url, "accessToken": "shpat_x"}),
            None,
        )
        .await
        .unwrap();

    let connection = &connected.connection;
    assert_eq!(connection.store_name, "Foo Store");
    assert_eq!(connection.connection_status, ConnectionStatus::Connected);
    assert_eq!(connection.user_id, user_id);
    assert!(!connection.encrypted_credentials.contains("shpat_x"));

    // Initial sync runs in the background after connect returns.
    assert!(
        server
            .wait_for("/admin/api/2024-01/products.json", Duration::from_secs(5))
            .await
    );
}

#[tokio::test]
async fn test_connect_with_rejected_credentials_writes_nothing() {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.valid = false;
    let adapter = Arc::new(adapter);
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let user_id = UserId::generate();

    let err = harness
        .service
        .connect_store(user_id, PlatformType::Custom, custom_credentials(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, IntegrationError::InvalidCredentials));
    assert_eq!(err.to_string(), "Invalid credentials for the selected platform");
    assert!(
        harness
            .service
            .get_user_connections(user_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_connect_missing_credential_field() {
    let adapter = Arc::new(MockAdapter::new(PlatformType::Custom));
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;

    let err = harness
        .service
        .connect_store(
            UserId::generate(),
            PlatformType::Custom,
            json!({"base_url": "https://store.example"}),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, IntegrationError::Credentials(_)));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_connect_unregistered_platform_is_unsupported() {
    let adapter = Arc::new(MockAdapter::new(PlatformType::Custom));
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;

    let err = harness
        .service
        .connect_store(
            UserId::generate(),
            PlatformType::Magento,
            json!({"base_url": "https://m.example", "access_token": "t"}),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Unsupported platform: magento");
}

// =============================================================================
// Sync
// =============================================================================

#[tokio::test]
async fn test_partial_sync_counts_item_failures() {
    let adapter = Arc::new(eight_of_ten());
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let user_id = UserId::generate();
    let connection_id = connect(&harness, user_id).await;

    let result = harness
        .service
        .sync_store_data(connection_id, &[SyncType::Products], SyncOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.items_synced, 8);
    assert_eq!(result.items_failed, 2);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].starts_with("Failed to sync product"));

    let history = harness
        .service
        .get_sync_history(user_id, connection_id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, result.sync_history_id);
    assert_eq!(history[0].status, SyncRunStatus::Partial);
    assert_eq!(history[0].items_synced, 8);
    assert_eq!(history[0].items_failed, 2);
    assert!(history[0].completed_at.is_some());

    let connection = harness
        .service
        .get_connection(user_id, connection_id)
        .await
        .unwrap();
    assert_eq!(connection.sync_status, SyncStatus::Idle);
    assert!(connection.last_sync_at.is_some());
}

#[tokio::test]
async fn test_full_sync_persists_every_type() {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = vec![product(PlatformType::Custom, "p1")];
    adapter.orders = vec![order(PlatformType::Custom, "o1"), order(PlatformType::Custom, "o2")];
    adapter.customers = vec![customer(PlatformType::Custom, "c1")];
    let adapter = Arc::new(adapter);
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let user_id = UserId::generate();
    let connection_id = connect(&harness, user_id).await;

    let result = harness
        .service
        .sync_store_data(connection_id, &SyncType::ALL, SyncOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.items_synced, 4);

    let counts = harness
        .service
        .get_synced_counts(user_id, connection_id)
        .await
        .unwrap();
    assert_eq!((counts.products, counts.orders, counts.customers), (1, 2, 1));

    let orders = harness
        .service
        .get_synced_orders(user_id, connection_id, 50)
        .await
        .unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.store_connection_id == connection_id));
}

#[tokio::test]
async fn test_resync_upserts_instead_of_duplicating() {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = vec![
        product(PlatformType::Custom, "p1"),
        product(PlatformType::Custom, "p2"),
    ];
    let adapter = Arc::new(adapter);
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let user_id = UserId::generate();
    let connection_id = connect(&harness, user_id).await;

    for _ in 0..2 {
        harness
            .service
            .sync_store_data(connection_id, &[SyncType::Products], SyncOptions::default())
            .await
            .unwrap();
    }

    let products = harness
        .service
        .get_synced_products(user_id, connection_id, 50)
        .await
        .unwrap();
    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn test_empty_sync_types_use_connection_settings() {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = vec![product(PlatformType::Custom, "p1")];
    adapter.customers = vec![customer(PlatformType::Custom, "c1")];
    let adapter = Arc::new(adapter);
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let user_id = UserId::generate();
    let connection_id = connect(&harness, user_id).await;

    // Default settings cover products and orders, not customers.
    let result = harness
        .service
        .sync_store_data(connection_id, &[], SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(result.items_synced, 1);
    let history = harness
        .service
        .get_sync_history(user_id, connection_id, 1)
        .await
        .unwrap();
    assert_eq!(history[0].sync_types, vec![SyncType::Products, SyncType::Orders]);
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_other_types() {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = vec![product(PlatformType::Custom, "p1")];
    adapter.orders_unavailable = true;
    let adapter = Arc::new(adapter);
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let user_id = UserId::generate();
    let connection_id = connect(&harness, user_id).await;

    let result = harness
        .service
        .sync_store_data(
            connection_id,
            &[SyncType::Orders, SyncType::Products],
            SyncOptions::default(),
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.items_synced, 1);
    assert_eq!(result.items_failed, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Failed to fetch orders"));

    let history = harness
        .service
        .get_sync_history(user_id, connection_id, 1)
        .await
        .unwrap();
    assert_eq!(history[0].status, SyncRunStatus::Partial);
}

#[tokio::test]
async fn test_sync_rejected_while_another_runs() {
    let adapter = Arc::new(eight_of_ten());
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let connection_id = connect(&harness, UserId::generate()).await;

    assert!(harness.store.try_begin_sync(connection_id).await.unwrap());

    let err = harness
        .service
        .sync_store_data(connection_id, &[SyncType::Products], SyncOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, IntegrationError::SyncInProgress));
    assert_eq!(err.to_string(), "Sync already in progress");
    assert_eq!(adapter.fetches(), 0);
}

#[tokio::test]
async fn test_sync_unknown_connection_is_not_found() {
    let adapter = Arc::new(MockAdapter::new(PlatformType::Custom));
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;

    let err = harness
        .service
        .sync_store_data(ConnectionId::generate(), &[], SyncOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Store connection not found");
}

#[tokio::test]
async fn test_queued_initial_sync_runs_on_worker() {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = vec![product(PlatformType::Custom, "p1")];
    let adapter = Arc::new(adapter);
    let mut harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    harness.spawn_worker();
    let user_id = UserId::generate();
    let connection_id = connect(&harness, user_id).await;

    let mut history = Vec::new();
    for _ in 0..200 {
        history = harness
            .service
            .get_sync_history(user_id, connection_id, 10)
            .await
            .unwrap();
        if history.iter().any(|h| h.status != SyncRunStatus::Running) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SyncRunStatus::Success);
    assert_eq!(history[0].items_synced, 1);
}

// =============================================================================
// Disconnect
// =============================================================================

#[tokio::test]
async fn test_disconnect_keeps_synced_data() {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = vec![product(PlatformType::Custom, "p1")];
    let adapter = Arc::new(adapter);
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let user_id = UserId::generate();
    let connection_id = connect(&harness, user_id).await;
    harness
        .service
        .sync_store_data(connection_id, &[SyncType::Products], SyncOptions::default())
        .await
        .unwrap();

    harness
        .service
        .disconnect_store(user_id, connection_id)
        .await
        .unwrap();

    let connection = harness
        .service
        .get_connection(user_id, connection_id)
        .await
        .unwrap();
    assert_eq!(connection.connection_status, ConnectionStatus::Disconnected);
    assert_eq!(connection.sync_status, SyncStatus::Idle);
    let counts = harness
        .service
        .get_synced_counts(user_id, connection_id)
        .await
        .unwrap();
    assert_eq!(counts.products, 1);

    let err = harness
        .service
        .sync_store_data(connection_id, &[], SyncOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IntegrationError::NotConnected));
}

#[tokio::test]
async fn test_disconnect_other_users_connection_is_not_found() {
    let adapter = Arc::new(MockAdapter::new(PlatformType::Custom));
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let owner = UserId::generate();
    let connection_id = connect(&harness, owner).await;

    let err = harness
        .service
        .disconnect_store(UserId::generate(), connection_id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Store connection not found");

    let err = harness
        .service
        .disconnect_store(owner, ConnectionId::generate())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Store connection not found");

    let connection = harness.service.get_connection(owner, connection_id).await.unwrap();
    assert_eq!(connection.connection_status, ConnectionStatus::Connected);
}

#[tokio::test]
async fn test_disconnect_twice_is_not_found() {
    let adapter = Arc::new(MockAdapter::new(PlatformType::Custom));
    let harness = TestHarness::new(MockAdapter::registry(&adapter)).await;
    let user_id = UserId::generate();
    let connection_id = connect(&harness, user_id).await;

    harness.service.disconnect_store(user_id, connection_id).await.unwrap();
    let err = harness
        .service
        .disconnect_store(user_id, connection_id)
        .await
        .unwrap_err();

    assert!(matches!(err, IntegrationError::NotFound));
}

/// In-memory store whose sync history rows can never be completed.
struct StuckHistoryStore(InMemoryStore);

#[async_trait]
impl IntegrationStore for StuckHistoryStore {
    async fn load_platform_configs(&self) -> Result<Vec<PlatformConfig>, RepositoryError> {
        self.0.load_platform_configs().await
    }

    async fn upsert_platform_config(&self, config: &PlatformConfig) -> Result<(), RepositoryError> {
        self.0.upsert_platform_config(config).await
    }

    async fn insert_connection(
        &self,
        connection: NewConnection,
    ) -> Result<StoreConnection, RepositoryError> {
        self.0.insert_connection(connection).await
    }

    async fn get_connection(
        &self,
        id: ConnectionId,
    ) -> Result<Option<StoreConnection>, RepositoryError> {
        self.0.get_connection(id).await
    }

    async fn get_user_connection(
        &self,
        user_id: UserId,
        id: ConnectionId,
    ) -> Result<Option<StoreConnection>, RepositoryError> {
        self.0.get_user_connection(user_id, id).await
    }

    async fn list_user_connections(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreConnection>, RepositoryError> {
        self.0.list_user_connections(user_id).await
    }

    async fn update_connection_status(
        &self,
        id: ConnectionId,
        connection_status: ConnectionStatus,
        sync_status: SyncStatus,
    ) -> Result<(), RepositoryError> {
        self.0
            .update_connection_status(id, connection_status, sync_status)
            .await
    }

    async fn try_begin_sync(&self, id: ConnectionId) -> Result<bool, RepositoryError> {
        self.0.try_begin_sync(id).await
    }

    async fn set_sync_status(
        &self,
        id: ConnectionId,
        sync_status: SyncStatus,
    ) -> Result<(), RepositoryError> {
        self.0.set_sync_status(id, sync_status).await
    }

    async fn touch_last_sync(
        &self,
        id: ConnectionId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.0.touch_last_sync(id, at).await
    }

    async fn update_settings(
        &self,
        id: ConnectionId,
        settings: &ConnectionSettings,
    ) -> Result<StoreConnection, RepositoryError> {
        self.0.update_settings(id, settings).await
    }

    async fn insert_sync_history(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        sync_types: &[SyncType],
        started_at: DateTime<Utc>,
    ) -> Result<SyncHistory, RepositoryError> {
        self.0
            .insert_sync_history(connection_id, user_id, sync_types, started_at)
            .await
    }

    async fn complete_sync_history(
        &self,
        _id: SyncHistoryId,
        _completion: &SyncCompletion,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Conflict("history table is read-only".to_string()))
    }

    async fn list_sync_history(
        &self,
        connection_id: ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncHistory>, RepositoryError> {
        self.0.list_sync_history(connection_id, limit).await
    }

    async fn upsert_product(
        &self,
        scope: SyncScope,
        product: &Product,
    ) -> Result<(), RepositoryError> {
        self.0.upsert_product(scope, product).await
    }

    async fn upsert_order(&self, scope: SyncScope, order: &Order) -> Result<(), RepositoryError> {
        self.0.upsert_order(scope, order).await
    }

    async fn upsert_customer(
        &self,
        scope: SyncScope,
        customer: &Customer,
    ) -> Result<(), RepositoryError> {
        self.0.upsert_customer(scope, customer).await
    }

    async fn list_synced_products(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedProduct>, RepositoryError> {
        self.0.list_synced_products(scope, limit).await
    }

    async fn list_synced_orders(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedOrder>, RepositoryError> {
        self.0.list_synced_orders(scope, limit).await
    }

    async fn list_synced_customers(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedCustomer>, RepositoryError> {
        self.0.list_synced_customers(scope, limit).await
    }

    async fn count_synced(&self, scope: SyncScope) -> Result<SyncedCounts, RepositoryError> {
        self.0.count_synced(scope).await
    }
}

#[tokio::test]
async fn test_history_write_failure_still_records_last_sync() {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = vec![product(PlatformType::Custom, "p1")];
    let adapter = Arc::new(adapter);
    let store: Arc<dyn IntegrationStore> =
        Arc::new(StuckHistoryStore(InMemoryStore::with_builtin_configs()));
    let (service, _worker) = build_service(
        Arc::clone(&store),
        MockAdapter::registry(&adapter),
        ApiClient::new().unwrap(),
        CredentialCipher::strong(&SecretString::from(TEST_ENCRYPTION_KEY)).unwrap(),
        "https://api.socialspark.test",
        immediate_worker(),
    )
    .await
    .unwrap();
    let user_id = UserId::generate();
    let connection_id = service
        .connect_store(user_id, PlatformType::Custom, custom_credentials(), None)
        .await
        .unwrap()
        .connection
        .id;
    let connected_at = store
        .get_connection(connection_id)
        .await
        .unwrap()
        .unwrap()
        .last_sync_at
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let result = service
        .sync_store_data(connection_id, &[SyncType::Products], SyncOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.items_synced, 1);
    let connection = store.get_connection(connection_id).await.unwrap().unwrap();
    assert!(connection.last_sync_at.unwrap() > connected_at);
    assert_eq!(connection.sync_status, SyncStatus::Idle);
    assert_eq!(
        service
            .get_synced_products(user_id, connection_id, 10)
            .await
            .unwrap()
            .len(),
        1
    );
}
