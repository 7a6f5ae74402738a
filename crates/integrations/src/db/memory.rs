//! In-memory [`IntegrationStore`] used by tests and local runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use socialspark_core::{
    ConnectionId, ConnectionSettings, ConnectionStatus, Customer, NewConnection, Order,
    PlatformConfig, PlatformType, Product, StoreConnection, SyncCompletion, SyncHistory,
    SyncHistoryId, SyncRunStatus, SyncScope, SyncStatus, SyncType, SyncedCounts, SyncedCustomer,
    SyncedOrder, SyncedProduct, UserId, builtin_platform_configs,
};
use tokio::sync::Mutex;

use super::{IntegrationStore, RepositoryError, require_platform_id};

/// Synced rows are keyed like the Postgres primary keys.
type EntityKey = (UserId, ConnectionId, String);

#[derive(Debug, Default)]
struct State {
    configs: BTreeMap<PlatformType, PlatformConfig>,
    connections: HashMap<ConnectionId, StoreConnection>,
    history: Vec<SyncHistory>,
    products: HashMap<EntityKey, SyncedProduct>,
    orders: HashMap<EntityKey, SyncedOrder>,
    customers: HashMap<EntityKey, SyncedCustomer>,
}

/// Process-local store. All data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Empty store with no platform configs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the shipped platform descriptors.
    #[must_use]
    pub fn with_builtin_configs() -> Self {
        let configs = builtin_platform_configs()
            .into_iter()
            .map(|c| (c.platform, c))
            .collect();
        Self {
            state: Mutex::new(State {
                configs,
                ..State::default()
            }),
        }
    }
}

fn connection_mut(
    state: &mut State,
    id: ConnectionId,
) -> Result<&mut StoreConnection, RepositoryError> {
    state.connections.get_mut(&id).ok_or(RepositoryError::NotFound)
}

fn in_scope(scope: SyncScope, user_id: UserId, connection_id: ConnectionId) -> bool {
    scope.user_id == user_id && scope.connection_id == connection_id
}

/// Newest `synced_at` first, truncated to `limit`.
fn newest<T: Clone>(
    rows: impl Iterator<Item = T>,
    limit: u32,
    at: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by_key(|r| std::cmp::Reverse(at(r)));
    rows.truncate(limit as usize);
    rows
}

#[async_trait]
impl IntegrationStore for InMemoryStore {
    async fn load_platform_configs(&self) -> Result<Vec<PlatformConfig>, RepositoryError> {
        Ok(self.state.lock().await.configs.values().cloned().collect())
    }

    async fn upsert_platform_config(&self, config: &PlatformConfig) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .await
            .configs
            .insert(config.platform, config.clone());
        Ok(())
    }

    async fn insert_connection(
        &self,
        connection: NewConnection,
    ) -> Result<StoreConnection, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.configs.contains_key(&connection.platform) {
            return Err(RepositoryError::Conflict(format!(
                "unknown platform {}",
                connection.platform
            )));
        }
        let now = Utc::now();
        let row = StoreConnection {
            id: ConnectionId::generate(),
            user_id: connection.user_id,
            platform: connection.platform,
            store_name: connection.store_name,
            store_domain: connection.store_domain,
            store_currency: connection.store_currency,
            store_timezone: connection.store_timezone,
            store_metadata: connection.store_metadata,
            encrypted_credentials: connection.encrypted_credentials,
            connection_status: ConnectionStatus::Connected,
            sync_status: SyncStatus::Idle,
            settings: connection.settings,
            last_sync_at: connection.last_sync_at,
            created_at: now,
            updated_at: now,
        };
        state.connections.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_connection(
        &self,
        id: ConnectionId,
    ) -> Result<Option<StoreConnection>, RepositoryError> {
        Ok(self.state.lock().await.connections.get(&id).cloned())
    }

    async fn get_user_connection(
        &self,
        user_id: UserId,
        id: ConnectionId,
    ) -> Result<Option<StoreConnection>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .await
            .connections
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn list_user_connections(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreConnection>, RepositoryError> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .connections
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| std::cmp::Reverse(c.created_at));
        Ok(rows)
    }

    async fn update_connection_status(
        &self,
        id: ConnectionId,
        connection_status: ConnectionStatus,
        sync_status: SyncStatus,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let connection = connection_mut(&mut state, id)?;
        connection.connection_status = connection_status;
        connection.sync_status = sync_status;
        connection.updated_at = Utc::now();
        Ok(())
    }

    async fn try_begin_sync(&self, id: ConnectionId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let connection = connection_mut(&mut state, id)?;
        if connection.sync_status != SyncStatus::Idle {
            return Ok(false);
        }
        connection.sync_status = SyncStatus::Syncing;
        connection.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_sync_status(
        &self,
        id: ConnectionId,
        sync_status: SyncStatus,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let connection = connection_mut(&mut state, id)?;
        connection.sync_status = sync_status;
        connection.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_last_sync(
        &self,
        id: ConnectionId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let connection = connection_mut(&mut state, id)?;
        connection.last_sync_at = Some(at);
        connection.updated_at = Utc::now();
        Ok(())
    }

    async fn update_settings(
        &self,
        id: ConnectionId,
        settings: &ConnectionSettings,
    ) -> Result<StoreConnection, RepositoryError> {
        let mut state = self.state.lock().await;
        let connection = connection_mut(&mut state, id)?;
        connection.settings = settings.clone();
        connection.updated_at = Utc::now();
        Ok(connection.clone())
    }

    async fn insert_sync_history(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        sync_types: &[SyncType],
        started_at: DateTime<Utc>,
    ) -> Result<SyncHistory, RepositoryError> {
        let row = SyncHistory {
            id: SyncHistoryId::generate(),
            connection_id,
            user_id,
            sync_types: sync_types.to_vec(),
            status: SyncRunStatus::Running,
            items_synced: 0,
            items_failed: 0,
            error_message: None,
            started_at,
            completed_at: None,
        };
        self.state.lock().await.history.push(row.clone());
        Ok(row)
    }

    async fn complete_sync_history(
        &self,
        id: SyncHistoryId,
        completion: &SyncCompletion,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let row = state
            .history
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.status = completion.status;
        row.items_synced = completion.items_synced;
        row.items_failed = completion.items_failed;
        row.error_message.clone_from(&completion.error_message);
        row.completed_at = Some(completion.completed_at);
        Ok(())
    }

    async fn list_sync_history(
        &self,
        connection_id: ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncHistory>, RepositoryError> {
        let state = self.state.lock().await;
        // Insertion order breaks ties between runs started in the same instant.
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|h| h.connection_id == connection_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn upsert_product(
        &self,
        scope: SyncScope,
        product: &Product,
    ) -> Result<(), RepositoryError> {
        require_platform_id("product", &product.platform_product_id)?;
        let key = (scope.user_id, scope.connection_id, product.platform_product_id.clone());
        let row = SyncedProduct {
            user_id: scope.user_id,
            store_connection_id: scope.connection_id,
            product: product.clone(),
            synced_at: Utc::now(),
        };
        self.state.lock().await.products.insert(key, row);
        Ok(())
    }

    async fn upsert_order(&self, scope: SyncScope, order: &Order) -> Result<(), RepositoryError> {
        require_platform_id("order", &order.platform_order_id)?;
        let key = (scope.user_id, scope.connection_id, order.platform_order_id.clone());
        let row = SyncedOrder {
            user_id: scope.user_id,
            store_connection_id: scope.connection_id,
            order: order.clone(),
            synced_at: Utc::now(),
        };
        self.state.lock().await.orders.insert(key, row);
        Ok(())
    }

    async fn upsert_customer(
        &self,
        scope: SyncScope,
        customer: &Customer,
    ) -> Result<(), RepositoryError> {
        require_platform_id("customer", &customer.platform_customer_id)?;
        let key = (scope.user_id, scope.connection_id, customer.platform_customer_id.clone());
        let row = SyncedCustomer {
            user_id: scope.user_id,
            store_connection_id: scope.connection_id,
            customer: customer.clone(),
            synced_at: Utc::now(),
        };
        self.state.lock().await.customers.insert(key, row);
        Ok(())
    }

    async fn list_synced_products(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedProduct>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(newest(
            state
                .products
                .values()
                .filter(|r| in_scope(scope, r.user_id, r.store_connection_id))
                .cloned(),
            limit,
            |r| r.synced_at,
        ))
    }

    async fn list_synced_orders(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedOrder>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(newest(
            state
                .orders
                .values()
                .filter(|r| in_scope(scope, r.user_id, r.store_connection_id))
                .cloned(),
            limit,
            |r| r.synced_at,
        ))
    }

    async fn list_synced_customers(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedCustomer>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(newest(
            state
                .customers
                .values()
                .filter(|r| in_scope(scope, r.user_id, r.store_connection_id))
                .cloned(),
            limit,
            |r| r.synced_at,
        ))
    }

    async fn count_synced(&self, scope: SyncScope) -> Result<SyncedCounts, RepositoryError> {
        let state = self.state.lock().await;
        let count = |matches: usize| matches as u64;
        Ok(SyncedCounts {
            products: count(
                state
                    .products
                    .values()
                    .filter(|r| in_scope(scope, r.user_id, r.store_connection_id))
                    .count(),
            ),
            orders: count(
                state
                    .orders
                    .values()
                    .filter(|r| in_scope(scope, r.user_id, r.store_connection_id))
                    .count(),
            ),
            customers: count(
                state
                    .customers
                    .values()
                    .filter(|r| in_scope(scope, r.user_id, r.store_connection_id))
                    .count(),
            ),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use socialspark_core::{Metadata, ProductStatus};

    fn new_connection(user_id: UserId) -> NewConnection {
        NewConnection {
            user_id,
            platform: PlatformType::Shopify,
            store_name: "Foo Store".to_string(),
            store_domain: "foo.myshopify.com".to_string(),
            store_currency: Some("USD".to_string()),
            store_timezone: None,
            store_metadata: Metadata::new(),
            encrypted_credentials: "blob".to_string(),
            settings: ConnectionSettings::default(),
            last_sync_at: None,
        }
    }

    fn product(id: &str, name: &str) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            price: Decimal::ONE,
            sku: None,
            inventory: 1,
            images: Vec::new(),
            status: ProductStatus::Active,
            platform: PlatformType::Shopify,
            platform_product_id: id.to_string(),
            metadata: Metadata::new(),
            variants: Vec::new(),
            categories: Vec::new(),
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_try_begin_sync_is_exclusive() {
        let store = InMemoryStore::with_builtin_configs();
        let connection = store.insert_connection(new_connection(UserId::generate())).await.unwrap();

        assert!(store.try_begin_sync(connection.id).await.unwrap());
        assert!(!store.try_begin_sync(connection.id).await.unwrap());
        store.set_sync_status(connection.id, SyncStatus::Idle).await.unwrap();
        assert!(store.try_begin_sync(connection.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_connection_is_scoped_to_owner() {
        let store = InMemoryStore::with_builtin_configs();
        let owner = UserId::generate();
        let connection = store.insert_connection(new_connection(owner)).await.unwrap();

        assert!(store.get_user_connection(owner, connection.id).await.unwrap().is_some());
        assert!(
            store
                .get_user_connection(UserId::generate(), connection.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_upsert_product_is_last_write_wins() {
        let store = InMemoryStore::with_builtin_configs();
        let user_id = UserId::generate();
        let connection = store.insert_connection(new_connection(user_id)).await.unwrap();
        let scope = SyncScope {
            user_id,
            connection_id: connection.id,
        };

        store.upsert_product(scope, &product("1", "Old")).await.unwrap();
        store.upsert_product(scope, &product("1", "New")).await.unwrap();

        let rows = store.list_synced_products(scope, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().unwrap().product.name, "New");
        assert_eq!(store.count_synced(scope).await.unwrap().products, 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_blank_platform_id() {
        let store = InMemoryStore::with_builtin_configs();
        let scope = SyncScope {
            user_id: UserId::generate(),
            connection_id: ConnectionId::generate(),
        };
        let err = store.upsert_product(scope, &product("", "Nameless")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = InMemoryStore::with_builtin_configs();
        let user_id = UserId::generate();
        let connection = store.insert_connection(new_connection(user_id)).await.unwrap();
        let now = Utc::now();
        let first = store
            .insert_sync_history(connection.id, user_id, &[SyncType::Products], now)
            .await
            .unwrap();
        let second = store
            .insert_sync_history(connection.id, user_id, &[SyncType::Orders], now)
            .await
            .unwrap();

        let history = store.list_sync_history(connection.id, 10).await.unwrap();
        assert_eq!(history.iter().map(|h| h.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert_eq!(store.list_sync_history(connection.id, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_connection_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .set_sync_status(ConnectionId::generate(), SyncStatus::Idle)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
