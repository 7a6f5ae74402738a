//! Shopify Admin REST adapter.
//!
//! - Base URL: `https://{shop}/admin/api/2024-01`
//! - Authentication: `X-Shopify-Access-Token: <token>`
//! - Page size: `limit` (max 250)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use socialspark_core::{
    Address, Customer, Order, OrderItem, PlatformConfig, PlatformCredentials, PlatformType,
    Product, ProductStatus, ProductVariant, ShopifyCredentials, StoreInfo, SyncOptions,
};
use tracing::instrument;
use url::Url;

use super::flex;
use super::http::{ApiClient, Auth, base_url, endpoint};
use super::webhook::verify_base64_hmac;
use super::{AdapterError, PlatformAdapter, mismatch};

const API_ROOT: &str = "/admin/api/2024-01";
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const DEFAULT_PAGE_SIZE: u32 = 250;
const MAX_PAGE_SIZE: u32 = 250;

/// Adapter for Shopify stores.
#[derive(Debug, Clone)]
pub struct ShopifyAdapter {
    config: PlatformConfig,
    http: ApiClient,
}

impl ShopifyAdapter {
    #[must_use]
    pub const fn new(config: PlatformConfig, http: ApiClient) -> Self {
        Self { config, http }
    }

    fn credentials<'a>(
        credentials: &'a PlatformCredentials,
    ) -> Result<&'a ShopifyCredentials, AdapterError> {
        credentials
            .as_shopify()
            .ok_or_else(|| mismatch(PlatformType::Shopify, credentials))
    }

    fn url(
        creds: &ShopifyCredentials,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Url, AdapterError> {
        endpoint(&base_url(&creds.shop, API_ROOT)?, path, query)
    }

    fn auth(creds: &ShopifyCredentials) -> Auth<'_> {
        Auth::Header {
            name: ACCESS_TOKEN_HEADER,
            value: &creds.access_token,
        }
    }
}

#[async_trait]
impl PlatformAdapter for ShopifyAdapter {
    fn platform(&self) -> PlatformType {
        PlatformType::Shopify
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    #[instrument(skip(self, credentials), fields(platform = "shopify"))]
    async fn validate_credentials(&self, credentials: &PlatformCredentials) -> bool {
        let Ok(creds) = Self::credentials(credentials) else {
            return false;
        };
        match Self::url(creds, "/shop.json", &[]) {
            Ok(url) => self.http.probe(url, Self::auth(creds)).await,
            Err(_) => false,
        }
    }

    #[instrument(skip(self, credentials), fields(platform = "shopify"))]
    async fn get_store_info(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<StoreInfo, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/shop.json", &[])?;
        let envelope: ShopEnvelope = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(map_store_info(envelope.shop, &creds.shop))
    }

    #[instrument(skip(self, credentials), fields(platform = "shopify"))]
    async fn get_products(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Product>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let limit = options.page_size(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let url = Self::url(creds, "/products.json", &[("limit", limit.to_string())])?;
        let page: ProductsPage = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(page.products.into_iter().map(map_product).collect())
    }

    #[instrument(skip(self, credentials), fields(platform = "shopify"))]
    async fn get_orders(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Order>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let limit = options.page_size(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let url = Self::url(
            creds,
            "/orders.json",
            &[("status", "any".to_string()), ("limit", limit.to_string())],
        )?;
        let page: OrdersPage = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(page.orders.into_iter().map(map_order).collect())
    }

    #[instrument(skip(self, credentials), fields(platform = "shopify"))]
    async fn get_customers(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Customer>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let limit = options.page_size(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let url = Self::url(creds, "/customers.json", &[("limit", limit.to_string())])?;
        let page: CustomersPage = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(page.customers.into_iter().map(map_customer).collect())
    }

    /// Checks `X-Shopify-Hmac-Sha256` against the app's webhook secret.
    fn validate_webhook(
        &self,
        credentials: &PlatformCredentials,
        payload: &[u8],
        signature: Option<&str>,
    ) -> bool {
        let (Some(creds), Some(signature)) = (credentials.as_shopify(), signature) else {
            return false;
        };
        creds
            .webhook_secret
            .as_deref()
            .is_some_and(|secret| verify_base64_hmac(secret, payload, signature))
    }
}

// =============================================================================
// Raw payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct ShopEnvelope {
    shop: RawShop,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawShop {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::string")]
    name: String,
    #[serde(deserialize_with = "flex::opt_string")]
    domain: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    myshopify_domain: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    currency: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    iana_timezone: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    timezone: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    email: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    plan_name: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductsPage {
    #[serde(default)]
    products: Vec<RawProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::string")]
    title: String,
    #[serde(deserialize_with = "flex::opt_string")]
    body_html: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    status: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    vendor: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    product_type: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    handle: Option<String>,
    #[serde(deserialize_with = "flex::string")]
    tags: String,
    variants: Vec<RawVariant>,
    images: Vec<RawImage>,
    #[serde(deserialize_with = "flex::opt_string")]
    created_at: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVariant {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::opt_string")]
    title: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    sku: Option<String>,
    #[serde(deserialize_with = "flex::decimal")]
    price: rust_decimal::Decimal,
    #[serde(deserialize_with = "flex::stock")]
    inventory_quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawImage {
    #[serde(deserialize_with = "flex::string")]
    src: String,
}

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<RawOrder>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrder {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::opt_string")]
    name: Option<String>,
    #[serde(deserialize_with = "flex::id")]
    order_number: String,
    #[serde(deserialize_with = "flex::opt_string")]
    email: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    contact_email: Option<String>,
    customer: Option<RawOrderCustomer>,
    #[serde(deserialize_with = "flex::decimal")]
    total_price: rust_decimal::Decimal,
    #[serde(deserialize_with = "flex::opt_string")]
    currency: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    financial_status: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    fulfillment_status: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    cancelled_at: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    created_at: Option<String>,
    line_items: Vec<RawLineItem>,
    shipping_address: Option<RawAddress>,
    billing_address: Option<RawAddress>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrderCustomer {
    #[serde(deserialize_with = "flex::opt_string")]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLineItem {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::id")]
    product_id: String,
    #[serde(deserialize_with = "flex::id")]
    variant_id: String,
    #[serde(deserialize_with = "flex::string")]
    title: String,
    #[serde(deserialize_with = "flex::opt_string")]
    name: Option<String>,
    #[serde(deserialize_with = "flex::decimal")]
    quantity: rust_decimal::Decimal,
    #[serde(deserialize_with = "flex::decimal")]
    price: rust_decimal::Decimal,
    #[serde(deserialize_with = "flex::opt_string")]
    sku: Option<String>,
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
    #[serde(deserialize_with = "flex::string")]
    address1: String,
    #[serde(deserialize_with = "flex::opt_string")]
    address2: Option<String>,
    #[serde(deserialize_with = "flex::string")]
    city: String,
    #[serde(deserialize_with = "flex::string")]
    province: String,
    #[serde(deserialize_with = "flex::string")]
    zip: String,
    #[serde(deserialize_with = "flex::string")]
    country: String,
    #[serde(deserialize_with = "flex::opt_string")]
    country_code: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomersPage {
    #[serde(default)]
    customers: Vec<RawCustomer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCustomer {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::string")]
    email: String,
    #[serde(deserialize_with = "flex::string")]
    first_name: String,
    #[serde(deserialize_with = "flex::string")]
    last_name: String,
    #[serde(deserialize_with = "flex::opt_string")]
    phone: Option<String>,
    orders_count: Value,
    #[serde(deserialize_with = "flex::opt_string")]
    total_spent: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    state: Option<String>,
    #[serde(deserialize_with = "flex::string")]
    tags: String,
    #[serde(deserialize_with = "flex::opt_string")]
    created_at: Option<String>,
}

// =============================================================================
// Mapping
// =============================================================================

fn map_store_info(shop: RawShop, fallback_domain: &str) -> StoreInfo {
    let domain = shop
        .domain
        .clone()
        .or_else(|| shop.myshopify_domain.clone())
        .unwrap_or_else(|| fallback_domain.to_string());
    let name = if shop.name.is_empty() { domain.clone() } else { shop.name };

    StoreInfo {
        name,
        domain,
        currency: shop.currency,
        timezone: shop.iana_timezone.or(shop.timezone),
        platform: PlatformType::Shopify,
        metadata: flex::metadata([
            ("shop_id", json!((!shop.id.is_empty()).then_some(shop.id))),
            ("myshopify_domain", json!(shop.myshopify_domain)),
            ("email", json!(shop.email)),
            ("plan_name", json!(shop.plan_name)),
            ("country_code", json!(shop.country_code)),
        ]),
    }
}

fn map_product_status(status: Option<&str>) -> ProductStatus {
    match status {
        Some("draft") => ProductStatus::Draft,
        Some("archived") => ProductStatus::Inactive,
        _ => ProductStatus::Active,
    }
}

fn map_product(raw: RawProduct) -> Product {
    let first_variant = raw.variants.first();
    let price = first_variant.map(|v| v.price).unwrap_or_default();
    let sku = first_variant.and_then(|v| v.sku.clone());
    let inventory = raw
        .variants
        .iter()
        .fold(0u32, |total, v| total.saturating_add(v.inventory_quantity));

    let variants = raw
        .variants
        .into_iter()
        .map(|v| ProductVariant {
            id: v.id,
            title: v.title,
            sku: v.sku,
            price: v.price,
            inventory: v.inventory_quantity,
        })
        .collect();

    Product {
        id: raw.id.clone(),
        name: raw.title,
        description: raw.body_html,
        price,
        sku,
        inventory,
        images: raw
            .images
            .into_iter()
            .map(|i| i.src)
            .filter(|src| !src.is_empty())
            .collect(),
        status: map_product_status(raw.status.as_deref()),
        platform: PlatformType::Shopify,
        platform_product_id: raw.id,
        metadata: flex::metadata([
            ("platform_status", json!(raw.status)),
            ("vendor", json!(raw.vendor)),
            ("handle", json!(raw.handle)),
            ("created_at", json!(raw.created_at)),
            ("updated_at", json!(raw.updated_at)),
        ]),
        variants,
        categories: raw.product_type.into_iter().collect(),
        tags: flex::split_tags(&raw.tags),
    }
}

fn map_address(raw: RawAddress) -> Option<Address> {
    let country = if raw.country.is_empty() {
        raw.country_code.unwrap_or_default()
    } else {
        raw.country
    };
    let address = Address {
        first_name: raw.first_name,
        last_name: raw.last_name,
        company: raw.company,
        address1: raw.address1,
        address2: raw.address2,
        city: raw.city,
        state: raw.province,
        postcode: raw.zip,
        country,
        phone: raw.phone,
    };
    (!address.is_blank()).then_some(address)
}

fn map_order(raw: RawOrder) -> Order {
    let customer_email = raw
        .email
        .or(raw.contact_email)
        .or_else(|| raw.customer.and_then(|c| c.email))
        .unwrap_or_default();
    let order_number = raw.name.unwrap_or_else(|| {
        if raw.order_number.is_empty() {
            raw.id.clone()
        } else {
            raw.order_number
        }
    });
    let status = if raw.cancelled_at.is_some() {
        "cancelled".to_string()
    } else {
        raw.financial_status.clone().unwrap_or_else(|| "pending".to_string())
    };

    Order {
        id: raw.id.clone(),
        order_number,
        customer_email,
        total_amount: raw.total_price,
        currency: raw.currency.unwrap_or_default(),
        status,
        order_date: flex::to_datetime(raw.created_at.as_deref()),
        items: raw.line_items.into_iter().map(map_line_item).collect(),
        shipping_address: raw.shipping_address.and_then(map_address),
        billing_address: raw.billing_address.and_then(map_address),
        platform: PlatformType::Shopify,
        platform_order_id: raw.id,
        metadata: flex::metadata([
            ("financial_status", json!(raw.financial_status)),
            ("fulfillment_status", json!(raw.fulfillment_status)),
        ]),
    }
}

fn map_line_item(raw: RawLineItem) -> OrderItem {
    OrderItem {
        id: raw.id,
        product_id: raw.product_id,
        product_name: raw.name.unwrap_or(raw.title),
        quantity: raw.quantity,
        unit_price: raw.price,
        total_price: raw.price * raw.quantity,
        sku: raw.sku,
        variant_id: (!raw.variant_id.is_empty()).then_some(raw.variant_id),
    }
}

fn map_customer(raw: RawCustomer) -> Customer {
    Customer {
        id: raw.id.clone(),
        email: raw.email,
        first_name: raw.first_name,
        last_name: raw.last_name,
        phone: raw.phone,
        platform: PlatformType::Shopify,
        platform_customer_id: raw.id,
        metadata: flex::metadata([
            ("orders_count", json!(flex::to_stock(&raw.orders_count))),
            ("total_spent", json!(raw.total_spent)),
            ("state", json!(raw.state)),
            ("tags", json!(flex::split_tags(&raw.tags))),
            ("created_at", json!(raw.created_at)),
        ]),
    }
}
