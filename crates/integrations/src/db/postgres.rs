//! `PostgreSQL` implementation of [`IntegrationStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use socialspark_core::{
    AuthMethod, ConnectionId, ConnectionSettings, ConnectionStatus, Customer, NewConnection, Order,
    PlatformConfig, PlatformType, Product, StoreConnection, SyncCompletion, SyncHistory,
    SyncHistoryId, SyncRunStatus, SyncScope, SyncStatus, SyncType, SyncedCounts, SyncedCustomer,
    SyncedOrder, SyncedProduct, UserId,
};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use super::{IntegrationStore, RepositoryError, require_platform_id};

const CONNECTION_COLUMNS: &str = "id, user_id, platform, store_name, store_domain, store_currency, \
     store_timezone, store_metadata, encrypted_credentials, connection_status, sync_status, \
     settings, last_sync_at, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, connection_id, user_id, sync_types, status, items_synced, \
     items_failed, error_message, started_at, completed_at";

// =============================================================================
// Row types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PlatformConfigRow {
    platform: String,
    display_name: String,
    description: String,
    api_fields: Value,
    supported_features: Value,
    auth_method: String,
    base_url: Option<String>,
    rate_limits: Value,
    is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ConnectionRow {
    id: Uuid,
    user_id: Uuid,
    platform: String,
    store_name: String,
    store_domain: String,
    store_currency: Option<String>,
    store_timezone: Option<String>,
    store_metadata: Value,
    encrypted_credentials: String,
    connection_status: String,
    sync_status: String,
    settings: Value,
    last_sync_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    connection_id: Uuid,
    user_id: Uuid,
    sync_types: Vec<String>,
    status: String,
    items_synced: i32,
    items_failed: i32,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

/// Synced entity row; the normalized entity lives in `data`.
#[derive(Debug, sqlx::FromRow)]
struct SyncedRow {
    user_id: Uuid,
    store_connection_id: Uuid,
    data: Value,
    synced_at: DateTime<Utc>,
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("{what}: {detail}"))
}

fn from_json<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, RepositoryError> {
    serde_json::from_value(value).map_err(|e| corrupt(what, e))
}

fn to_count(what: &str, value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|e| corrupt(what, e))
}

fn to_db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl TryFrom<PlatformConfigRow> for PlatformConfig {
    type Error = RepositoryError;

    fn try_from(row: PlatformConfigRow) -> Result<Self, Self::Error> {
        Ok(Self {
            platform: row
                .platform
                .parse::<PlatformType>()
                .map_err(|e| corrupt("platform_configs.platform", e))?,
            display_name: row.display_name,
            description: row.description,
            api_fields: from_json("platform_configs.api_fields", row.api_fields)?,
            supported_features: from_json(
                "platform_configs.supported_features",
                row.supported_features,
            )?,
            auth_method: from_json::<AuthMethod>(
                "platform_configs.auth_method",
                Value::String(row.auth_method),
            )?,
            base_url: row.base_url,
            rate_limits: from_json("platform_configs.rate_limits", row.rate_limits)?,
            is_active: row.is_active,
        })
    }
}

impl TryFrom<ConnectionRow> for StoreConnection {
    type Error = RepositoryError;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ConnectionId::new(row.id),
            user_id: UserId::new(row.user_id),
            platform: row
                .platform
                .parse()
                .map_err(|e| corrupt("store_connections.platform", e))?,
            store_name: row.store_name,
            store_domain: row.store_domain,
            store_currency: row.store_currency,
            store_timezone: row.store_timezone,
            store_metadata: from_json("store_connections.store_metadata", row.store_metadata)?,
            encrypted_credentials: row.encrypted_credentials,
            connection_status: row
                .connection_status
                .parse::<ConnectionStatus>()
                .map_err(|e| corrupt("store_connections.connection_status", e))?,
            sync_status: row
                .sync_status
                .parse::<SyncStatus>()
                .map_err(|e| corrupt("store_connections.sync_status", e))?,
            settings: from_json::<ConnectionSettings>("store_connections.settings", row.settings)?,
            last_sync_at: row.last_sync_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<HistoryRow> for SyncHistory {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let sync_types = row
            .sync_types
            .iter()
            .map(|t| t.parse::<SyncType>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt("sync_history.sync_types", e))?;
        Ok(Self {
            id: SyncHistoryId::new(row.id),
            connection_id: ConnectionId::new(row.connection_id),
            user_id: UserId::new(row.user_id),
            sync_types,
            status: row
                .status
                .parse::<SyncRunStatus>()
                .map_err(|e| corrupt("sync_history.status", e))?,
            items_synced: to_count("sync_history.items_synced", row.items_synced)?,
            items_failed: to_count("sync_history.items_failed", row.items_failed)?,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// `PostgreSQL`-backed store.
#[derive(Debug, Clone)]
pub struct PgIntegrationStore {
    pool: PgPool,
}

impl PgIntegrationStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn require_connection(&self, id: ConnectionId) -> Result<(), RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM store_connections WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    async fn list_synced<T: DeserializeOwned>(
        &self,
        table: &str,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<(SyncedRow, T)>, RepositoryError> {
        let sql = format!(
            "SELECT user_id, store_connection_id, data, synced_at FROM {table} \
             WHERE user_id = $1 AND store_connection_id = $2 \
             ORDER BY synced_at DESC LIMIT $3"
        );
        let rows = sqlx::query_as::<_, SyncedRow>(&sql)
            .bind(scope.user_id.as_uuid())
            .bind(scope.connection_id.as_uuid())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|mut row| {
                let data = std::mem::take(&mut row.data);
                let entity = from_json(&format!("{table}.data"), data)?;
                Ok((row, entity))
            })
            .collect()
    }
}

#[async_trait]
impl IntegrationStore for PgIntegrationStore {
    #[instrument(skip(self))]
    async fn load_platform_configs(&self) -> Result<Vec<PlatformConfig>, RepositoryError> {
        let rows = sqlx::query_as::<_, PlatformConfigRow>(
            "SELECT platform, display_name, description, api_fields, supported_features, \
             auth_method, base_url, rate_limits, is_active \
             FROM platform_configs ORDER BY platform",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PlatformConfig::try_from).collect()
    }

    #[instrument(skip(self, config), fields(platform = %config.platform))]
    async fn upsert_platform_config(&self, config: &PlatformConfig) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO platform_configs \
             (platform, display_name, description, api_fields, supported_features, auth_method, \
              base_url, rate_limits, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (platform) DO UPDATE SET \
               display_name = EXCLUDED.display_name, \
               description = EXCLUDED.description, \
               api_fields = EXCLUDED.api_fields, \
               supported_features = EXCLUDED.supported_features, \
               auth_method = EXCLUDED.auth_method, \
               base_url = EXCLUDED.base_url, \
               rate_limits = EXCLUDED.rate_limits, \
               is_active = EXCLUDED.is_active, \
               updated_at = NOW()",
        )
        .bind(config.platform.as_str())
        .bind(&config.display_name)
        .bind(&config.description)
        .bind(Json(&config.api_fields))
        .bind(Json(&config.supported_features))
        .bind(config.auth_method.as_str())
        .bind(&config.base_url)
        .bind(Json(&config.rate_limits))
        .bind(config.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(
        skip(self, connection),
        fields(user_id = %connection.user_id, platform = %connection.platform)
    )]
    async fn insert_connection(
        &self,
        connection: NewConnection,
    ) -> Result<StoreConnection, RepositoryError> {
        let sql = format!(
            "INSERT INTO store_connections \
             (id, user_id, platform, store_name, store_domain, store_currency, store_timezone, \
              store_metadata, encrypted_credentials, connection_status, sync_status, settings, \
              last_sync_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'connected', 'idle', $10, $11) \
             RETURNING {CONNECTION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(connection.user_id.as_uuid())
            .bind(connection.platform.as_str())
            .bind(&connection.store_name)
            .bind(&connection.store_domain)
            .bind(&connection.store_currency)
            .bind(&connection.store_timezone)
            .bind(Json(&connection.store_metadata))
            .bind(&connection.encrypted_credentials)
            .bind(Json(&connection.settings))
            .bind(connection.last_sync_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    RepositoryError::Conflict(format!("unknown platform {}", connection.platform))
                }
                _ => RepositoryError::Database(e),
            })?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn get_connection(
        &self,
        id: ConnectionId,
    ) -> Result<Option<StoreConnection>, RepositoryError> {
        let sql = format!("SELECT {CONNECTION_COLUMNS} FROM store_connections WHERE id = $1");
        sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(StoreConnection::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn get_user_connection(
        &self,
        user_id: UserId,
        id: ConnectionId,
    ) -> Result<Option<StoreConnection>, RepositoryError> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM store_connections WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(StoreConnection::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list_user_connections(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreConnection>, RepositoryError> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM store_connections \
             WHERE user_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(StoreConnection::try_from)
            .collect()
    }

    #[instrument(skip(self))]
    async fn update_connection_status(
        &self,
        id: ConnectionId,
        connection_status: ConnectionStatus,
        sync_status: SyncStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE store_connections \
             SET connection_status = $2, sync_status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(connection_status.as_str())
        .bind(sync_status.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn try_begin_sync(&self, id: ConnectionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE store_connections SET sync_status = 'syncing', updated_at = NOW() \
             WHERE id = $1 AND sync_status = 'idle'",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.require_connection(id).await?;
        Ok(false)
    }

    #[instrument(skip(self))]
    async fn set_sync_status(
        &self,
        id: ConnectionId,
        sync_status: SyncStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE store_connections SET sync_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(sync_status.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch_last_sync(
        &self,
        id: ConnectionId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE store_connections SET last_sync_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, settings))]
    async fn update_settings(
        &self,
        id: ConnectionId,
        settings: &ConnectionSettings,
    ) -> Result<StoreConnection, RepositoryError> {
        let sql = format!(
            "UPDATE store_connections SET settings = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {CONNECTION_COLUMNS}"
        );
        sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(id.as_uuid())
            .bind(Json(settings))
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
    }

    #[instrument(skip(self))]
    async fn insert_sync_history(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        sync_types: &[SyncType],
        started_at: DateTime<Utc>,
    ) -> Result<SyncHistory, RepositoryError> {
        let sql = format!(
            "INSERT INTO sync_history (id, connection_id, user_id, sync_types, status, started_at) \
             VALUES ($1, $2, $3, $4, 'running', $5) RETURNING {HISTORY_COLUMNS}"
        );
        let types: Vec<&str> = sync_types.iter().map(|t| t.as_str()).collect();
        sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(connection_id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(&types)
            .bind(started_at)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    #[instrument(skip(self, completion), fields(status = %completion.status))]
    async fn complete_sync_history(
        &self,
        id: SyncHistoryId,
        completion: &SyncCompletion,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE sync_history SET status = $2, items_synced = $3, items_failed = $4, \
             error_message = $5, completed_at = $6 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(completion.status.as_str())
        .bind(to_db_count(completion.items_synced))
        .bind(to_db_count(completion.items_failed))
        .bind(&completion.error_message)
        .bind(completion.completed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_sync_history(
        &self,
        connection_id: ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncHistory>, RepositoryError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM sync_history WHERE connection_id = $1 \
             ORDER BY started_at DESC LIMIT $2"
        );
        sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(connection_id.as_uuid())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SyncHistory::try_from)
            .collect()
    }

    async fn upsert_product(
        &self,
        scope: SyncScope,
        product: &Product,
    ) -> Result<(), RepositoryError> {
        require_platform_id("product", &product.platform_product_id)?;
        sqlx::query(
            "INSERT INTO synced_products \
             (user_id, store_connection_id, platform, platform_product_id, name, price, sku, \
              inventory, status, data, synced_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW()) \
             ON CONFLICT (user_id, store_connection_id, platform_product_id) DO UPDATE SET \
               platform = EXCLUDED.platform, name = EXCLUDED.name, price = EXCLUDED.price, \
               sku = EXCLUDED.sku, inventory = EXCLUDED.inventory, status = EXCLUDED.status, \
               data = EXCLUDED.data, synced_at = NOW()",
        )
        .bind(scope.user_id.as_uuid())
        .bind(scope.connection_id.as_uuid())
        .bind(product.platform.as_str())
        .bind(&product.platform_product_id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.sku)
        .bind(i64::from(product.inventory))
        .bind(product.status.as_str())
        .bind(Json(product))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_order(&self, scope: SyncScope, order: &Order) -> Result<(), RepositoryError> {
        require_platform_id("order", &order.platform_order_id)?;
        sqlx::query(
            "INSERT INTO synced_orders \
             (user_id, store_connection_id, platform, platform_order_id, order_number, \
              customer_email, total_amount, currency, status, order_date, data, synced_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW()) \
             ON CONFLICT (user_id, store_connection_id, platform_order_id) DO UPDATE SET \
               platform = EXCLUDED.platform, order_number = EXCLUDED.order_number, \
               customer_email = EXCLUDED.customer_email, total_amount = EXCLUDED.total_amount, \
               currency = EXCLUDED.currency, status = EXCLUDED.status, \
               order_date = EXCLUDED.order_date, data = EXCLUDED.data, synced_at = NOW()",
        )
        .bind(scope.user_id.as_uuid())
        .bind(scope.connection_id.as_uuid())
        .bind(order.platform.as_str())
        .bind(&order.platform_order_id)
        .bind(&order.order_number)
        .bind(&order.customer_email)
        .bind(order.total_amount)
        .bind(&order.currency)
        .bind(&order.status)
        .bind(order.order_date)
        .bind(Json(order))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_customer(
        &self,
        scope: SyncScope,
        customer: &Customer,
    ) -> Result<(), RepositoryError> {
        require_platform_id("customer", &customer.platform_customer_id)?;
        sqlx::query(
            "INSERT INTO synced_customers \
             (user_id, store_connection_id, platform, platform_customer_id, email, data, synced_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             ON CONFLICT (user_id, store_connection_id, platform_customer_id) DO UPDATE SET \
               platform = EXCLUDED.platform, email = EXCLUDED.email, \
               data = EXCLUDED.data, synced_at = NOW()",
        )
        .bind(scope.user_id.as_uuid())
        .bind(scope.connection_id.as_uuid())
        .bind(customer.platform.as_str())
        .bind(&customer.platform_customer_id)
        .bind(&customer.email)
        .bind(Json(customer))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_synced_products(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedProduct>, RepositoryError> {
        Ok(self
            .list_synced::<Product>("synced_products", scope, limit)
            .await?
            .into_iter()
            .map(|(row, product)| SyncedProduct {
                user_id: UserId::new(row.user_id),
                store_connection_id: ConnectionId::new(row.store_connection_id),
                product,
                synced_at: row.synced_at,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_synced_orders(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedOrder>, RepositoryError> {
        Ok(self
            .list_synced::<Order>("synced_orders", scope, limit)
            .await?
            .into_iter()
            .map(|(row, order)| SyncedOrder {
                user_id: UserId::new(row.user_id),
                store_connection_id: ConnectionId::new(row.store_connection_id),
                order,
                synced_at: row.synced_at,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_synced_customers(
        &self,
        scope: SyncScope,
        limit: u32,
    ) -> Result<Vec<SyncedCustomer>, RepositoryError> {
        Ok(self
            .list_synced::<Customer>("synced_customers", scope, limit)
            .await?
            .into_iter()
            .map(|(row, customer)| SyncedCustomer {
                user_id: UserId::new(row.user_id),
                store_connection_id: ConnectionId::new(row.store_connection_id),
                customer,
                synced_at: row.synced_at,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn count_synced(&self, scope: SyncScope) -> Result<SyncedCounts, RepositoryError> {
        let (products, orders, customers): (i64, i64, i64) = sqlx::query_as(
            "SELECT \
               (SELECT COUNT(*) FROM synced_products WHERE user_id = $1 AND store_connection_id = $2), \
               (SELECT COUNT(*) FROM synced_orders WHERE user_id = $1 AND store_connection_id = $2), \
               (SELECT COUNT(*) FROM synced_customers WHERE user_id = $1 AND store_connection_id = $2)",
        )
        .bind(scope.user_id.as_uuid())
        .bind(scope.connection_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        let to_u64 = |n: i64| u64::try_from(n).unwrap_or(0);
        Ok(SyncedCounts {
            products: to_u64(products),
            orders: to_u64(orders),
            customers: to_u64(customers),
        })
    }
}
