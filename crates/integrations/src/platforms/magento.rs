//! Magento 2 / Adobe Commerce REST adapter.
//!
//! - Base URL: `{base_url}/rest/V1`
//! - Authentication: `Authorization: Bearer <integration token>`
//! - Page size: `searchCriteria[pageSize]` (max 100)

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use socialspark_core::{
    Address, Customer, MagentoCredentials, Order, OrderItem, PlatformConfig, PlatformCredentials,
    PlatformType, Product, ProductStatus, StoreInfo, SyncOptions,
};
use tracing::instrument;
use url::Url;

use super::flex;
use super::http::{ApiClient, Auth, base_url, endpoint};
use super::{AdapterError, PlatformAdapter, mismatch};

const API_ROOT: &str = "/rest/V1";
const MEDIA_ROOT: &str = "/media/catalog/product";
const PAGE_SIZE_PARAM: &str = "searchCriteria[pageSize]";
const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 100;
/// `status` attribute value for enabled products.
const STATUS_ENABLED: &str = "1";

/// Adapter for Magento 2 stores.
#[derive(Debug, Clone)]
pub struct MagentoAdapter {
    config: PlatformConfig,
    http: ApiClient,
}

impl MagentoAdapter {
    #[must_use]
    pub const fn new(config: PlatformConfig, http: ApiClient) -> Self {
        Self { config, http }
    }

    fn credentials<'a>(
        credentials: &'a PlatformCredentials,
    ) -> Result<&'a MagentoCredentials, AdapterError> {
        credentials
            .as_magento()
            .ok_or_else(|| mismatch(PlatformType::Magento, credentials))
    }

    fn url(
        creds: &MagentoCredentials,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Url, AdapterError> {
        endpoint(&base_url(&creds.base_url, API_ROOT)?, path, query)
    }

    fn auth(creds: &MagentoCredentials) -> Auth<'_> {
        Auth::Bearer(&creds.access_token)
    }

    fn page_query(options: &SyncOptions) -> [(&'static str, String); 1] {
        [(
            PAGE_SIZE_PARAM,
            options.page_size(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE).to_string(),
        )]
    }
}

#[async_trait]
impl PlatformAdapter for MagentoAdapter {
    fn platform(&self) -> PlatformType {
        PlatformType::Magento
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    #[instrument(skip(self, credentials), fields(platform = "magento"))]
    async fn validate_credentials(&self, credentials: &PlatformCredentials) -> bool {
        let Ok(creds) = Self::credentials(credentials) else {
            return false;
        };
        match Self::url(creds, "/store/storeConfigs", &[]) {
            Ok(url) => self.http.probe(url, Self::auth(creds)).await,
            Err(_) => false,
        }
    }

    /// Currency and timezone from the default store config; the display name
    /// comes from store views when that lookup succeeds.
    #[instrument(skip(self, credentials), fields(platform = "magento"))]
    async fn get_store_info(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<StoreInfo, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/store/storeConfigs", &[])?;
        let configs: Vec<RawStoreConfig> = self.http.get_json(url, Self::auth(creds)).await?;
        let config = configs
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::Parse("storeConfigs returned no stores".to_string()))?;

        let views_url = Self::url(creds, "/store/storeViews", &[])?;
        let views = match self
            .http
            .get_json::<Vec<RawStoreView>>(views_url, Self::auth(creds))
            .await
        {
            Ok(views) => views,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch Magento store views");
                Vec::new()
            }
        };

        Ok(map_store_info(config, &views, &creds.base_url))
    }

    #[instrument(skip(self, credentials), fields(platform = "magento"))]
    async fn get_products(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Product>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/products", &Self::page_query(options))?;
        let page: SearchResult<RawProduct> = self.http.get_json(url, Self::auth(creds)).await?;
        let media_base = base_url(&creds.base_url, MEDIA_ROOT)?;
        Ok(page
            .items
            .into_iter()
            .map(|raw| map_product(raw, &media_base))
            .collect())
    }

    #[instrument(skip(self, credentials), fields(platform = "magento"))]
    async fn get_orders(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Order>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/orders", &Self::page_query(options))?;
        let page: SearchResult<RawOrder> = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(page.items.into_iter().map(map_order).collect())
    }

    #[instrument(skip(self, credentials), fields(platform = "magento"))]
    async fn get_customers(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Customer>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/customers/search", &Self::page_query(options))?;
        let page: SearchResult<RawCustomer> = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(page.items.into_iter().map(map_customer).collect())
    }
}

// =============================================================================
// Raw payloads
// =============================================================================

/// Envelope of every Magento `searchCriteria` endpoint.
#[derive(Debug, Deserialize)]
struct SearchResult<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStoreConfig {
    #[serde(deserialize_with = "flex::opt_string")]
    code: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    locale: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    base_currency_code: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    default_display_currency_code: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    timezone: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    weight_unit: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    base_url: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    secure_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStoreView {
    #[serde(deserialize_with = "flex::string")]
    code: String,
    #[serde(deserialize_with = "flex::string")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAttribute {
    #[serde(deserialize_with = "flex::string")]
    attribute_code: String,
    value: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStockItem {
    #[serde(deserialize_with = "flex::stock")]
    qty: u32,
    is_in_stock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProductExtension {
    stock_item: Option<RawStockItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMediaEntry {
    #[serde(deserialize_with = "flex::string")]
    file: String,
    disabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::opt_string")]
    sku: Option<String>,
    #[serde(deserialize_with = "flex::string")]
    name: String,
    #[serde(deserialize_with = "flex::decimal")]
    price: Decimal,
    #[serde(deserialize_with = "flex::id")]
    status: String,
    #[serde(deserialize_with = "flex::opt_string")]
    type_id: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    created_at: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    updated_at: Option<String>,
    extension_attributes: RawProductExtension,
    custom_attributes: Vec<RawAttribute>,
    media_gallery_entries: Vec<RawMediaEntry>,
}

impl RawProduct {
    fn attribute(&self, code: &str) -> Option<String> {
        self.custom_attributes
            .iter()
            .find(|a| a.attribute_code == code)
            .and_then(|a| flex::to_opt_string(&a.value))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAddress {
    #[serde(deserialize_with = "flex::string")]
    firstname: String,
    #[serde(deserialize_with = "flex::string")]
    lastname: String,
    #[serde(deserialize_with = "flex::opt_string")]
    company: Option<String>,
    street: Option<Vec<String>>,
    #[serde(deserialize_with = "flex::string")]
    city: String,
    #[serde(deserialize_with = "flex::string")]
    region: String,
    #[serde(deserialize_with = "flex::string")]
    postcode: String,
    #[serde(deserialize_with = "flex::string")]
    country_id: String,
    #[serde(deserialize_with = "flex::opt_string")]
    telephone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawShipping {
    address: Option<RawAddress>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawShippingAssignment {
    shipping: RawShipping,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrderExtension {
    shipping_assignments: Vec<RawShippingAssignment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLineItem {
    #[serde(deserialize_with = "flex::id")]
    item_id: String,
    #[serde(deserialize_with = "flex::id")]
    product_id: String,
    #[serde(deserialize_with = "flex::string")]
    name: String,
    #[serde(deserialize_with = "flex::opt_string")]
    sku: Option<String>,
    #[serde(deserialize_with = "flex::decimal")]
    qty_ordered: Decimal,
    #[serde(deserialize_with = "flex::decimal")]
    price: Decimal,
    row_total: Value,
    /// Set on the child row of a configurable product; the parent row carries the price.
    #[serde(deserialize_with = "flex::opt_string")]
    parent_item_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrder {
    #[serde(deserialize_with = "flex::id")]
    entity_id: String,
    #[serde(deserialize_with = "flex::id")]
    increment_id: String,
    #[serde(deserialize_with = "flex::string")]
    customer_email: String,
    #[serde(deserialize_with = "flex::decimal")]
    grand_total: Decimal,
    #[serde(deserialize_with = "flex::opt_string")]
    order_currency_code: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    base_currency_code: Option<String>,
    #[serde(deserialize_with = "flex::string")]
    status: String,
    #[serde(deserialize_with = "flex::opt_string")]
    state: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    created_at: Option<String>,
    items: Vec<RawLineItem>,
    billing_address: Option<RawAddress>,
    extension_attributes: RawOrderExtension,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCustomerAddress {
    #[serde(deserialize_with = "flex::opt_string")]
    telephone: Option<String>,
    default_billing: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCustomer {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::string")]
    email: String,
    #[serde(deserialize_with = "flex::string")]
    firstname: String,
    #[serde(deserialize_with = "flex::string")]
    lastname: String,
    #[serde(deserialize_with = "flex::id")]
    group_id: String,
    #[serde(deserialize_with = "flex::id")]
    website_id: String,
    #[serde(deserialize_with = "flex::opt_string")]
    created_at: Option<String>,
    addresses: Vec<RawCustomerAddress>,
}

// =============================================================================
// Mapping
// =============================================================================

fn map_store_info(config: RawStoreConfig, views: &[RawStoreView], base: &str) -> StoreInfo {
    let domain = config
        .secure_base_url
        .clone()
        .or_else(|| config.base_url.clone())
        .unwrap_or_else(|| base.trim_end_matches('/').to_string())
        .trim_end_matches('/')
        .to_string();
    let code = config.code.clone().unwrap_or_else(|| "default".to_string());
    let name = views
        .iter()
        .find(|v| v.code == code && !v.name.is_empty())
        .map_or_else(|| domain.clone(), |v| v.name.clone());

    StoreInfo {
        name,
        domain,
        currency: config.default_display_currency_code.or(config.base_currency_code),
        timezone: config.timezone,
        platform: PlatformType::Magento,
        metadata: flex::metadata([
            ("store_code", json!(code)),
            ("locale", json!(config.locale)),
            ("weight_unit", json!(config.weight_unit)),
        ]),
    }
}

fn map_product_status(status: &str) -> ProductStatus {
    if status == STATUS_ENABLED || status.is_empty() {
        ProductStatus::Active
    } else {
        ProductStatus::Inactive
    }
}

fn map_product(raw: RawProduct, media_base: &str) -> Product {
    let description = raw
        .attribute("description")
        .or_else(|| raw.attribute("short_description"));
    let stock = raw.extension_attributes.stock_item.as_ref();
    let inventory = stock.map_or(0, |s| s.qty);
    let in_stock = stock.and_then(|s| s.is_in_stock);

    Product {
        id: raw.id.clone(),
        name: raw.name,
        description,
        price: raw.price,
        sku: raw.sku,
        inventory,
        images: raw
            .media_gallery_entries
            .into_iter()
            .filter(|m| !m.disabled && !m.file.is_empty())
            .map(|m| format!("{media_base}{}", m.file))
            .collect(),
        status: map_product_status(&raw.status),
        platform: PlatformType::Magento,
        platform_product_id: raw.id,
        metadata: flex::metadata([
            ("platform_status", json!((!raw.status.is_empty()).then_some(raw.status))),
            ("type_id", json!(raw.type_id)),
            ("is_in_stock", json!(in_stock)),
            ("created_at", json!(raw.created_at)),
            ("updated_at", json!(raw.updated_at)),
        ]),
        variants: Vec::new(),
        categories: Vec::new(),
        tags: Vec::new(),
    }
}

fn map_address(raw: RawAddress) -> Option<Address> {
    let mut street = raw.street.unwrap_or_default().into_iter().filter(|s| !s.trim().is_empty());
    let address1 = street.next().unwrap_or_default();
    let rest: Vec<String> = street.collect();
    let address = Address {
        first_name: raw.firstname,
        last_name: raw.lastname,
        company: raw.company,
        address1,
        address2: (!rest.is_empty()).then(|| rest.join(", ")),
        city: raw.city,
        state: raw.region,
        postcode: raw.postcode,
        country: raw.country_id,
        phone: raw.telephone,
    };
    (!address.is_blank()).then_some(address)
}

fn map_line_item(raw: RawLineItem) -> OrderItem {
    let total_price = if flex::to_opt_string(&raw.row_total).is_some() {
        flex::to_decimal(&raw.row_total)
    } else {
        raw.price * raw.qty_ordered
    };
    OrderItem {
        id: raw.item_id,
        product_id: raw.product_id,
        product_name: raw.name,
        quantity: raw.qty_ordered,
        unit_price: raw.price,
        total_price,
        sku: raw.sku,
        variant_id: None,
    }
}

fn map_order(raw: RawOrder) -> Order {
    let shipping_address = raw
        .extension_attributes
        .shipping_assignments
        .into_iter()
        .find_map(|a| a.shipping.address)
        .and_then(map_address);
    let order_number = if raw.increment_id.is_empty() {
        raw.entity_id.clone()
    } else {
        raw.increment_id
    };

    Order {
        id: raw.entity_id.clone(),
        order_number,
        customer_email: raw.customer_email,
        total_amount: raw.grand_total,
        currency: raw
            .order_currency_code
            .or(raw.base_currency_code)
            .unwrap_or_default(),
        status: raw.status,
        order_date: flex::to_datetime(raw.created_at.as_deref()),
        items: raw
            .items
            .into_iter()
            .filter(|item| item.parent_item_id.is_none())
            .map(map_line_item)
            .collect(),
        shipping_address,
        billing_address: raw.billing_address.and_then(map_address),
        platform: PlatformType::Magento,
        platform_order_id: raw.entity_id,
        metadata: flex::metadata([("state", json!(raw.state))]),
    }
}

fn map_customer(raw: RawCustomer) -> Customer {
    let phone = raw
        .addresses
        .iter()
        .find(|a| a.default_billing)
        .or_else(|| raw.addresses.first())
        .and_then(|a| a.telephone.clone());

    Customer {
        id: raw.id.clone(),
        email: raw.email,
        first_name: raw.firstname,
        last_name: raw.lastname,
        phone,
        platform: PlatformType::Magento,
        platform_customer_id: raw.id,
        metadata: flex::metadata([
            ("group_id", json!(raw.group_id)),
            ("website_id", json!(raw.website_id)),
            ("created_at", json!(raw.created_at)),
        ]),
    }
}
