//! Adapter for storefronts exposing the SocialSpark REST contract.
//!
//! - Base URL: the connection's `base_url`
//! - Authentication: `Authorization: Bearer <api_key>`
//! - Endpoints: `/health`, `/store`, `/products`, `/orders`, `/customers`
//! - Page size: `limit` (max 100)
//!
//! Custom backends are written by merchants, so list endpoints may return a
//! bare array or wrap it under the entity name, `data` or `items`, and fields
//! may use the common model's names or a few well-known alternates.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use socialspark_core::{
    Address, CustomCredentials, Customer, Metadata, Order, OrderItem, PlatformConfig,
    PlatformCredentials, PlatformType, Product, ProductStatus, StoreInfo, SyncOptions,
};
use tracing::instrument;
use url::Url;

use super::flex;
use super::http::{ApiClient, Auth, base_url, endpoint};
use super::{AdapterError, PlatformAdapter, mismatch};

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 100;

/// Adapter for custom REST storefronts.
#[derive(Debug, Clone)]
pub struct CustomAdapter {
    config: PlatformConfig,
    http: ApiClient,
}

impl CustomAdapter {
    #[must_use]
    pub const fn new(config: PlatformConfig, http: ApiClient) -> Self {
        Self { config, http }
    }

    fn credentials<'a>(
        credentials: &'a PlatformCredentials,
    ) -> Result<&'a CustomCredentials, AdapterError> {
        credentials
            .as_custom()
            .ok_or_else(|| mismatch(PlatformType::Custom, credentials))
    }

    fn url(
        creds: &CustomCredentials,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Url, AdapterError> {
        endpoint(&base_url(&creds.base_url, "")?, path, query)
    }

    fn auth(creds: &CustomCredentials) -> Auth<'_> {
        Auth::Bearer(&creds.api_key)
    }

    /// Fetch one page from a list endpoint and decode each entry.
    async fn list<T: DeserializeOwned>(
        &self,
        creds: &CustomCredentials,
        entity: &str,
        options: &SyncOptions,
    ) -> Result<Vec<T>, AdapterError> {
        let limit = options.page_size(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let url = Self::url(creds, &format!("/{entity}"), &[("limit", limit.to_string())])?;
        let body: Value = self.http.get_json(url, Self::auth(creds)).await?;
        unwrap_list(body, entity)?
            .into_iter()
            .map(|item| {
                serde_json::from_value(item)
                    .map_err(|e| AdapterError::Parse(format!("Invalid {entity} entry: {e}")))
            })
            .collect()
    }
}

#[async_trait]
impl PlatformAdapter for CustomAdapter {
    fn platform(&self) -> PlatformType {
        PlatformType::Custom
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    #[instrument(skip(self, credentials), fields(platform = "custom"))]
    async fn validate_credentials(&self, credentials: &PlatformCredentials) -> bool {
        let Ok(creds) = Self::credentials(credentials) else {
            return false;
        };
        match Self::url(creds, "/health", &[]) {
            Ok(url) => self.http.probe(url, Self::auth(creds)).await,
            Err(_) => false,
        }
    }

    #[instrument(skip(self, credentials), fields(platform = "custom"))]
    async fn get_store_info(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<StoreInfo, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/store", &[])?;
        let body: Value = self.http.get_json(url, Self::auth(creds)).await?;
        // Accept both `{...}` and `{"store": {...}}`.
        let body = match body {
            Value::Object(mut map) if map.contains_key("store") => {
                map.remove("store").unwrap_or(Value::Null)
            }
            other => other,
        };
        let raw: RawStore = serde_json::from_value(body)
            .map_err(|e| AdapterError::Parse(format!("Invalid store response: {e}")))?;
        Ok(map_store_info(raw, &creds.base_url))
    }

    #[instrument(skip(self, credentials), fields(platform = "custom"))]
    async fn get_products(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Product>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let raw: Vec<RawProduct> = self.list(creds, "products", options).await?;
        Ok(raw.into_iter().map(map_product).collect())
    }

    #[instrument(skip(self, credentials), fields(platform = "custom"))]
    async fn get_orders(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Order>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let raw: Vec<RawOrder> = self.list(creds, "orders", options).await?;
        Ok(raw.into_iter().map(map_order).collect())
    }

    #[instrument(skip(self, credentials), fields(platform = "custom"))]
    async fn get_customers(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Customer>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let raw: Vec<RawCustomer> = self.list(creds, "customers", options).await?;
        Ok(raw.into_iter().map(map_customer).collect())
    }
}

/// Extract the entry array from a list response.
fn unwrap_list(body: Value, entity: &str) -> Result<Vec<Value>, AdapterError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => [entity, "data", "items"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| AdapterError::Parse(format!("Expected a list of {entity}"))),
        _ => Err(AdapterError::Parse(format!("Expected a list of {entity}"))),
    }
}

// =============================================================================
// Raw payloads
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStore {
    #[serde(alias = "store_name", deserialize_with = "flex::string")]
    name: String,
    #[serde(alias = "url", deserialize_with = "flex::opt_string")]
    domain: Option<String>,
    #[serde(alias = "currency_code", deserialize_with = "flex::opt_string")]
    currency: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    timezone: Option<String>,
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    #[serde(alias = "product_id", deserialize_with = "flex::id")]
    id: String,
    #[serde(alias = "title", deserialize_with = "flex::string")]
    name: String,
    #[serde(deserialize_with = "flex::opt_string")]
    description: Option<String>,
    #[serde(deserialize_with = "flex::decimal")]
    price: Decimal,
    #[serde(deserialize_with = "flex::opt_string")]
    sku: Option<String>,
    #[serde(alias = "stock", alias = "quantity", deserialize_with = "flex::stock")]
    inventory: u32,
    images: Vec<Value>,
    #[serde(deserialize_with = "flex::opt_string")]
    status: Option<String>,
    categories: Vec<String>,
    tags: Vec<String>,
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAddress {
    #[serde(deserialize_with = "flex::string")]
    first_name: String,
    #[serde(deserialize_with = "flex::string")]
    last_name: String,
    #[serde(deserialize_with = "flex::opt_string")]
    company: Option<String>,
    #[serde(alias = "address_1", alias = "line1", deserialize_with = "flex::string")]
    address1: String,
    #[serde(alias = "address_2", alias = "line2", deserialize_with = "flex::opt_string")]
    address2: Option<String>,
    #[serde(deserialize_with = "flex::string")]
    city: String,
    #[serde(alias = "province", alias = "region", deserialize_with = "flex::string")]
    state: String,
    #[serde(alias = "zip", alias = "postal_code", deserialize_with = "flex::string")]
    postcode: String,
    #[serde(deserialize_with = "flex::string")]
    country: String,
    #[serde(deserialize_with = "flex::opt_string")]
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrderItem {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::id")]
    product_id: String,
    #[serde(alias = "name", deserialize_with = "flex::string")]
    product_name: String,
    #[serde(deserialize_with = "flex::decimal")]
    quantity: Decimal,
    #[serde(alias = "price", deserialize_with = "flex::decimal")]
    unit_price: Decimal,
    #[serde(alias = "total")]
    total_price: Value,
    #[serde(deserialize_with = "flex::opt_string")]
    sku: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    variant_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrder {
    #[serde(alias = "order_id", deserialize_with = "flex::id")]
    id: String,
    #[serde(alias = "number", deserialize_with = "flex::id")]
    order_number: String,
    #[serde(alias = "email", deserialize_with = "flex::string")]
    customer_email: String,
    #[serde(alias = "total", deserialize_with = "flex::decimal")]
    total_amount: Decimal,
    #[serde(deserialize_with = "flex::string")]
    currency: String,
    #[serde(deserialize_with = "flex::string")]
    status: String,
    #[serde(alias = "created_at", deserialize_with = "flex::opt_string")]
    order_date: Option<String>,
    items: Vec<RawOrderItem>,
    shipping_address: Option<RawAddress>,
    billing_address: Option<RawAddress>,
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCustomer {
    #[serde(alias = "customer_id", deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::string")]
    email: String,
    #[serde(alias = "firstname", deserialize_with = "flex::string")]
    first_name: String,
    #[serde(alias = "lastname", deserialize_with = "flex::string")]
    last_name: String,
    #[serde(deserialize_with = "flex::opt_string")]
    phone: Option<String>,
    metadata: Option<Map<String, Value>>,
}

// =============================================================================
// Mapping
// =============================================================================

fn map_store_info(raw: RawStore, base: &str) -> StoreInfo {
    let domain = raw
        .domain
        .unwrap_or_else(|| base.trim().trim_end_matches('/').to_string());
    let name = if raw.name.is_empty() { domain.clone() } else { raw.name };
    StoreInfo {
        name,
        domain,
        currency: raw.currency,
        timezone: raw.timezone,
        platform: PlatformType::Custom,
        metadata: raw.metadata.unwrap_or_default(),
    }
}

fn map_product_status(status: Option<&str>) -> ProductStatus {
    status
        .and_then(|s| s.to_ascii_lowercase().parse().ok())
        .unwrap_or_default()
}

/// Image entries may be plain URLs or objects with `url` or `src`.
fn image_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("src"))
            .and_then(flex::to_opt_string),
        _ => None,
    }
}

fn map_product(raw: RawProduct) -> Product {
    let mut metadata: Metadata = raw.metadata.unwrap_or_default();
    if let Some(status) = &raw.status {
        metadata.insert("platform_status".to_string(), Value::from(status.clone()));
    }

    Product {
        id: raw.id.clone(),
        name: raw.name,
        description: raw.description,
        price: raw.price,
        sku: raw.sku,
        inventory: raw.inventory,
        images: raw.images.iter().filter_map(image_url).collect(),
        status: map_product_status(raw.status.as_deref()),
        platform: PlatformType::Custom,
        platform_product_id: raw.id,
        metadata,
        variants: Vec::new(),
        categories: raw.categories,
        tags: raw.tags,
    }
}

fn map_address(raw: RawAddress) -> Option<Address> {
    let address = Address {
        first_name: raw.first_name,
        last_name: raw.last_name,
        company: raw.company,
        address1: raw.address1,
        address2: raw.address2,
        city: raw.city,
        state: raw.state,
        postcode: raw.postcode,
        country: raw.country,
        phone: raw.phone,
    };
    (!address.is_blank()).then_some(address)
}

fn map_order_item(raw: RawOrderItem) -> OrderItem {
    let total_price = if flex::to_opt_string(&raw.total_price).is_some() {
        flex::to_decimal(&raw.total_price)
    } else {
        raw.unit_price * raw.quantity
    };
    OrderItem {
        id: raw.id,
        product_id: raw.product_id,
        product_name: raw.product_name,
        quantity: raw.quantity,
        unit_price: raw.unit_price,
        total_price,
        sku: raw.sku,
        variant_id: raw.variant_id,
    }
}

fn map_order(raw: RawOrder) -> Order {
    let order_number = if raw.order_number.is_empty() {
        raw.id.clone()
    } else {
        raw.order_number
    };
    Order {
        id: raw.id.clone(),
        order_number,
        customer_email: raw.customer_email,
        total_amount: raw.total_amount,
        currency: raw.currency,
        status: raw.status,
        order_date: flex::to_datetime(raw.order_date.as_deref()),
        items: raw.items.into_iter().map(map_order_item).collect(),
        shipping_address: raw.shipping_address.and_then(map_address),
        billing_address: raw.billing_address.and_then(map_address),
        platform: PlatformType::Custom,
        platform_order_id: raw.id,
        metadata: raw.metadata.unwrap_or_default(),
    }
}

fn map_customer(raw: RawCustomer) -> Customer {
    Customer {
        id: raw.id.clone(),
        email: raw.email,
        first_name: raw.first_name,
        last_name: raw.last_name,
        phone: raw.phone,
        platform: PlatformType::Custom,
        platform_customer_id: raw.id,
        metadata: raw.metadata.unwrap_or_default(),
    }
}
