//! Integration test helpers for SocialSpark store integrations.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p socialspark-integration-tests
//! ```
//!
//! No database or network access is needed: tests run against
//! [`InMemoryStore`] and local mock storefronts bound to `127.0.0.1:0`.
//!
//! # Helpers
//!
//! - [`MockStorefront`] - axum server answering canned JSON per path and
//!   recording every request it receives
//! - [`MockAdapter`] - in-process [`PlatformAdapter`] with scripted data
//! - [`TestHarness`] - service, façade and store wired over the in-memory store

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
};
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use socialspark_core::{
    Customer, Metadata, Order, PlatformConfig, PlatformCredentials, PlatformType, Product,
    ProductStatus, StoreInfo, SyncOptions, builtin_platform_configs,
};
use socialspark_integrations::{
    api::StoreIntegrationApi,
    build_service,
    config::SyncWorkerConfig,
    crypto::CredentialCipher,
    db::{InMemoryStore, IntegrationStore},
    platforms::{AdapterError, AdapterRegistry, ApiClient, PlatformAdapter},
    routes,
    services::{StoreIntegrationService, SyncWorker},
    state::AppState,
};

// =============================================================================
// Mock storefront
// =============================================================================

/// One request seen by a [`MockStorefront`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

#[derive(Debug, Default)]
struct MockRoutes {
    responses: HashMap<String, (StatusCode, Value)>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Canned-response HTTP server. Unknown paths answer 404.
#[derive(Debug)]
pub struct MockStorefront {
    pub base_url: String,
    routes: Arc<MockRoutes>,
}

/// Builder for [`MockStorefront`].
#[derive(Debug, Default)]
pub struct MockStorefrontBuilder {
    responses: HashMap<String, (StatusCode, Value)>,
}

impl MockStorefrontBuilder {
    /// Answer `path` with `200` and `body`.
    #[must_use]
    pub fn json(mut self, path: &str, body: Value) -> Self {
        self.responses.insert(path.to_string(), (StatusCode::OK, body));
        self
    }

    /// Answer `path` with `status` and a platform-style error body.
    #[must_use]
    pub fn status(mut self, path: &str, status: StatusCode) -> Self {
        let body = json!({"message": status.canonical_reason().unwrap_or("error")});
        self.responses.insert(path.to_string(), (status, body));
        self
    }

    pub async fn start(self) -> MockStorefront {
        let routes = Arc::new(MockRoutes {
            responses: self.responses,
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .fallback(respond)
            .with_state(Arc::clone(&routes));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockStorefront {
            base_url: format!("http://{addr}"),
            routes,
        }
    }
}

async fn respond(
    State(routes): State<Arc<MockRoutes>>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    routes.requests.lock().unwrap().push(RecordedRequest {
        path: uri.path().to_string(),
        query: uri.query().map(ToString::to_string),
        headers,
    });
    routes.responses.get(uri.path()).map_or_else(
        || (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))),
        |(status, body)| (*status, Json(body.clone())),
    )
}

impl MockStorefront {
    #[must_use]
    pub fn builder() -> MockStorefrontBuilder {
        MockStorefrontBuilder::default()
    }

    /// Every request received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.routes.requests.lock().unwrap().clone()
    }

    /// Requests whose path equals `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    /// Poll until `path` has been requested, or give up after `timeout`.
    pub async fn wait_for(&self, path: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if !self.requests_to(path).is_empty() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

// =============================================================================
// Mock adapter
// =============================================================================

/// Scripted adapter. Products with a blank id are rejected by every store,
/// which makes per-item failures easy to provoke.
#[derive(Debug)]
pub struct MockAdapter {
    config: PlatformConfig,
    pub valid: bool,
    pub store_name: String,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    pub customers: Vec<Customer>,
    /// Fail `get_orders` with a 503.
    pub orders_unavailable: bool,
    fetches: AtomicUsize,
}

impl MockAdapter {
    /// Valid adapter for `platform` with no data.
    #[must_use]
    pub fn new(platform: PlatformType) -> Self {
        let config = builtin_platform_configs()
            .into_iter()
            .find(|c| c.platform == platform)
            .unwrap();
        Self {
            config,
            valid: true,
            store_name: "Mock Store".to_string(),
            products: Vec::new(),
            orders: Vec::new(),
            customers: Vec::new(),
            orders_unavailable: false,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `get_*` calls served.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Registry whose only adapter is `adapter`.
    #[must_use]
    pub fn registry(adapter: &Arc<Self>) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        let shared = Arc::clone(adapter);
        registry.register(adapter.config.platform, move |_config, _http| {
            Arc::clone(&shared) as Arc<dyn PlatformAdapter>
        });
        registry
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> PlatformType {
        self.config.platform
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn validate_credentials(&self, _credentials: &PlatformCredentials) -> bool {
        self.valid
    }

    async fn get_store_info(
        &self,
        _credentials: &PlatformCredentials,
    ) -> Result<StoreInfo, AdapterError> {
        Ok(StoreInfo {
            name: self.store_name.clone(),
            domain: "mock.example".to_string(),
            currency: Some("USD".to_string()),
            timezone: None,
            platform: self.config.platform,
            metadata: Metadata::new(),
        })
    }

    async fn get_products(
        &self,
        _credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Product>, AdapterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        Ok(self.products.iter().take(limit).cloned().collect())
    }

    async fn get_orders(
        &self,
        _credentials: &PlatformCredentials,
        _options: &SyncOptions,
    ) -> Result<Vec<Order>, AdapterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.orders_unavailable {
            return Err(AdapterError::Api {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(self.orders.clone())
    }

    async fn get_customers(
        &self,
        _credentials: &PlatformCredentials,
        _options: &SyncOptions,
    ) -> Result<Vec<Customer>, AdapterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.customers.clone())
    }
}

/// Product with platform id `id`.
#[must_use]
pub fn product(platform: PlatformType, id: &str) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {id}"),
        description: None,
        price: Decimal::new(1999, 2),
        sku: Some(format!("SKU-{id}")),
        inventory: 5,
        images: Vec::new(),
        status: ProductStatus::Active,
        platform,
        platform_product_id: id.to_string(),
        metadata: Metadata::new(),
        variants: Vec::new(),
        categories: Vec::new(),
        tags: Vec::new(),
    }
}

/// Order with platform id `id`.
#[must_use]
pub fn order(platform: PlatformType, id: &str) -> Order {
    Order {
        id: id.to_string(),
        order_number: format!("#{id}"),
        customer_email: "buyer@example.com".to_string(),
        total_amount: Decimal::new(4200, 2),
        currency: "USD".to_string(),
        status: "paid".to_string(),
        order_date: Utc::now(),
        items: Vec::new(),
        shipping_address: None,
        billing_address: None,
        platform,
        platform_order_id: id.to_string(),
        metadata: Metadata::new(),
    }
}

/// Customer with platform id `id`.
#[must_use]
pub fn customer(platform: PlatformType, id: &str) -> Customer {
    Customer {
        id: id.to_string(),
        email: format!("customer{id}@example.com"),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        phone: None,
        platform,
        platform_customer_id: id.to_string(),
        metadata: Metadata::new(),
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Encryption secret used by every harness.
pub const TEST_ENCRYPTION_KEY: &str = "integration-tests-credential-key-7f3a9c";

/// Worker settings with no delays, so queued syncs run immediately.
#[must_use]
pub const fn immediate_worker() -> SyncWorkerConfig {
    SyncWorkerConfig {
        initial_delay: Duration::ZERO,
        max_attempts: 2,
        base_backoff: Duration::from_millis(10),
    }
}

/// Service, façade and store wired together over [`InMemoryStore`].
pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub service: Arc<StoreIntegrationService>,
    pub api: StoreIntegrationApi,
    worker: Option<SyncWorker>,
}

impl TestHarness {
    /// Harness over `registry` with the built-in platform configs.
    pub async fn new(registry: AdapterRegistry) -> Self {
        Self::with_store(registry, InMemoryStore::with_builtin_configs()).await
    }

    pub async fn with_store(registry: AdapterRegistry, store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        let cipher = CredentialCipher::strong(&SecretString::from(TEST_ENCRYPTION_KEY)).unwrap();
        let (service, worker) = build_service(
            Arc::clone(&store) as Arc<dyn IntegrationStore>,
            registry,
            ApiClient::new().unwrap(),
            cipher,
            "https://api.socialspark.test",
            immediate_worker(),
        )
        .await
        .unwrap();
        let api = StoreIntegrationApi::new(Arc::clone(&service), 4);
        Self {
            store,
            service,
            api,
            worker: Some(worker),
        }
    }

    /// Start the background sync worker. Until this runs, queued syncs wait.
    pub fn spawn_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            tokio::spawn(worker.run());
        }
    }

    /// Router over this harness, without middleware.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::routes().with_state(AppState::new(self.api.clone(), None))
    }
}
