//! WooCommerce REST API v3 adapter.
//!
//! - Base URL: `{site_url}/wp-json/wc/v3`
//! - Authentication: HTTP Basic with consumer key and secret
//! - Page size: `per_page` (max 100)

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use socialspark_core::{
    Address, Customer, Order, OrderItem, PlatformConfig, PlatformCredentials, PlatformType,
    Product, ProductStatus, StoreInfo, SyncOptions, WooCommerceCredentials,
};
use tracing::instrument;
use url::Url;

use super::flex;
use super::http::{ApiClient, Auth, base_url, endpoint};
use super::webhook::verify_base64_hmac;
use super::{AdapterError, PlatformAdapter, mismatch};

const API_ROOT: &str = "/wp-json/wc/v3";
const WP_ROOT: &str = "/wp-json";
const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 100;

/// Adapter for WooCommerce stores.
#[derive(Debug, Clone)]
pub struct WooCommerceAdapter {
    config: PlatformConfig,
    http: ApiClient,
}

impl WooCommerceAdapter {
    #[must_use]
    pub const fn new(config: PlatformConfig, http: ApiClient) -> Self {
        Self { config, http }
    }

    fn credentials<'a>(
        credentials: &'a PlatformCredentials,
    ) -> Result<&'a WooCommerceCredentials, AdapterError> {
        credentials
            .as_woocommerce()
            .ok_or_else(|| mismatch(PlatformType::WooCommerce, credentials))
    }

    fn url(
        creds: &WooCommerceCredentials,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Url, AdapterError> {
        endpoint(&base_url(&creds.site_url, API_ROOT)?, path, query)
    }

    fn auth(creds: &WooCommerceCredentials) -> Auth<'_> {
        Auth::Basic {
            username: &creds.consumer_key,
            password: &creds.consumer_secret,
        }
    }

    fn page_query(options: &SyncOptions) -> [(&'static str, String); 1] {
        [(
            "per_page",
            options.page_size(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE).to_string(),
        )]
    }
}

#[async_trait]
impl PlatformAdapter for WooCommerceAdapter {
    fn platform(&self) -> PlatformType {
        PlatformType::WooCommerce
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    #[instrument(skip(self, credentials), fields(platform = "woocommerce"))]
    async fn validate_credentials(&self, credentials: &PlatformCredentials) -> bool {
        let Ok(creds) = Self::credentials(credentials) else {
            return false;
        };
        match Self::url(creds, "/system_status", &[]) {
            Ok(url) => self.http.probe(url, Self::auth(creds)).await,
            Err(_) => false,
        }
    }

    /// Site name from the WordPress index, currency from WooCommerce.
    ///
    /// The currency lookup is best-effort; a failure leaves it unset.
    #[instrument(skip(self, credentials), fields(platform = "woocommerce"))]
    async fn get_store_info(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<StoreInfo, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let index_url = endpoint(&base_url(&creds.site_url, WP_ROOT)?, "", &[])?;
        let site: RawSite = self.http.get_json(index_url, Self::auth(creds)).await?;

        let currency_url = Self::url(creds, "/data/currencies/current", &[])?;
        let currency = match self
            .http
            .get_json::<RawCurrency>(currency_url, Self::auth(creds))
            .await
        {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch WooCommerce currency");
                None
            }
        };

        Ok(map_store_info(site, currency, &creds.site_url))
    }

    #[instrument(skip(self, credentials), fields(platform = "woocommerce"))]
    async fn get_products(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Product>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/products", &Self::page_query(options))?;
        let raw: Vec<RawProduct> = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(raw.into_iter().map(map_product).collect())
    }

    #[instrument(skip(self, credentials), fields(platform = "woocommerce"))]
    async fn get_orders(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Order>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/orders", &Self::page_query(options))?;
        let raw: Vec<RawOrder> = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(raw.into_iter().map(map_order).collect())
    }

    #[instrument(skip(self, credentials), fields(platform = "woocommerce"))]
    async fn get_customers(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Customer>, AdapterError> {
        let creds = Self::credentials(credentials)?;
        let url = Self::url(creds, "/customers", &Self::page_query(options))?;
        let raw: Vec<RawCustomer> = self.http.get_json(url, Self::auth(creds)).await?;
        Ok(raw.into_iter().map(map_customer).collect())
    }

    /// Checks `X-WC-Webhook-Signature`. WooCommerce signs with the secret set
    /// on the webhook, which defaults to the consumer secret.
    fn validate_webhook(
        &self,
        credentials: &PlatformCredentials,
        payload: &[u8],
        signature: Option<&str>,
    ) -> bool {
        let (Some(creds), Some(signature)) = (credentials.as_woocommerce(), signature) else {
            return false;
        };
        let secret = creds
            .webhook_secret
            .as_deref()
            .unwrap_or(&creds.consumer_secret);
        verify_base64_hmac(secret, payload, signature)
    }
}

// =============================================================================
// Raw payloads
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSite {
    #[serde(deserialize_with = "flex::string")]
    name: String,
    #[serde(deserialize_with = "flex::opt_string")]
    description: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    url: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    home: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    timezone_string: Option<String>,
    gmt_offset: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCurrency {
    #[serde(deserialize_with = "flex::opt_string")]
    code: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    symbol: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNamed {
    #[serde(deserialize_with = "flex::string")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawImage {
    #[serde(deserialize_with = "flex::string")]
    src: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::string")]
    name: String,
    #[serde(deserialize_with = "flex::opt_string")]
    description: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    short_description: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    sku: Option<String>,
    price: Value,
    regular_price: Value,
    sale_price: Value,
    #[serde(deserialize_with = "flex::stock")]
    stock_quantity: u32,
    #[serde(deserialize_with = "flex::opt_string")]
    stock_status: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    status: Option<String>,
    #[serde(rename = "type", deserialize_with = "flex::opt_string")]
    product_type: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    permalink: Option<String>,
    images: Vec<RawImage>,
    categories: Vec<RawNamed>,
    tags: Vec<RawNamed>,
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
    address_1: String,
    #[serde(deserialize_with = "flex::opt_string")]
    address_2: Option<String>,
    #[serde(deserialize_with = "flex::string")]
    city: String,
    #[serde(deserialize_with = "flex::string")]
    state: String,
    #[serde(deserialize_with = "flex::string")]
    postcode: String,
    #[serde(deserialize_with = "flex::string")]
    country: String,
    #[serde(deserialize_with = "flex::opt_string")]
    email: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLineItem {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::id")]
    product_id: String,
    #[serde(deserialize_with = "flex::id")]
    variation_id: String,
    #[serde(deserialize_with = "flex::string")]
    name: String,
    #[serde(deserialize_with = "flex::decimal")]
    quantity: Decimal,
    #[serde(deserialize_with = "flex::decimal")]
    price: Decimal,
    total: Value,
    #[serde(deserialize_with = "flex::opt_string")]
    sku: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrder {
    #[serde(deserialize_with = "flex::id")]
    id: String,
    #[serde(deserialize_with = "flex::id")]
    number: String,
    #[serde(deserialize_with = "flex::string")]
    status: String,
    #[serde(deserialize_with = "flex::string")]
    currency: String,
    #[serde(deserialize_with = "flex::decimal")]
    total: Decimal,
    #[serde(deserialize_with = "flex::opt_string")]
    date_created: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    date_created_gmt: Option<String>,
    #[serde(deserialize_with = "flex::id")]
    customer_id: String,
    #[serde(deserialize_with = "flex::opt_string")]
    payment_method_title: Option<String>,
    billing: Option<RawAddress>,
    shipping: Option<RawAddress>,
    line_items: Vec<RawLineItem>,
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
    username: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    role: Option<String>,
    #[serde(deserialize_with = "flex::opt_string")]
    date_created: Option<String>,
    billing: Option<RawAddress>,
}

// =============================================================================
// Mapping
// =============================================================================

fn map_store_info(site: RawSite, currency: Option<RawCurrency>, site_url: &str) -> StoreInfo {
    let domain = site
        .home
        .or(site.url)
        .unwrap_or_else(|| site_url.trim_end_matches('/').to_string());
    let name = if site.name.is_empty() { domain.clone() } else { site.name };
    let (code, symbol) = currency.map_or((None, None), |c| (c.code, c.symbol));

    StoreInfo {
        name,
        domain,
        currency: code,
        timezone: site.timezone_string,
        platform: PlatformType::WooCommerce,
        metadata: flex::metadata([
            ("description", json!(site.description)),
            ("currency_symbol", json!(symbol)),
            ("gmt_offset", site.gmt_offset),
        ]),
    }
}

/// `publish` is live, `draft`/`pending` are unpublished, `private` is hidden.
fn map_product_status(status: Option<&str>) -> ProductStatus {
    match status {
        None | Some("publish") => ProductStatus::Active,
        Some("draft" | "pending" | "future") => ProductStatus::Draft,
        Some(_) => ProductStatus::Inactive,
    }
}

fn map_product(raw: RawProduct) -> Product {
    // `price` is empty for products that only have a regular price set.
    let price = if flex::to_opt_string(&raw.price).is_some() {
        flex::to_decimal(&raw.price)
    } else {
        flex::to_decimal(&raw.regular_price)
    };

    Product {
        id: raw.id.clone(),
        name: raw.name,
        description: raw.description.or(raw.short_description),
        price,
        sku: raw.sku,
        inventory: raw.stock_quantity,
        images: raw
            .images
            .into_iter()
            .map(|i| i.src)
            .filter(|src| !src.is_empty())
            .collect(),
        status: map_product_status(raw.status.as_deref()),
        platform: PlatformType::WooCommerce,
        platform_product_id: raw.id,
        metadata: flex::metadata([
            ("platform_status", json!(raw.status)),
            ("stock_status", json!(raw.stock_status)),
            ("type", json!(raw.product_type)),
            ("permalink", json!(raw.permalink)),
            ("regular_price", json!(flex::to_opt_string(&raw.regular_price))),
            ("sale_price", json!(flex::to_opt_string(&raw.sale_price))),
        ]),
        variants: Vec::new(),
        categories: raw.categories.into_iter().map(|c| c.name).collect(),
        tags: raw.tags.into_iter().map(|t| t.name).collect(),
    }
}

fn map_address(raw: RawAddress) -> Option<Address> {
    let address = Address {
        first_name: raw.first_name,
        last_name: raw.last_name,
        company: raw.company,
        address1: raw.address_1,
        address2: raw.address_2,
        city: raw.city,
        state: raw.state,
        postcode: raw.postcode,
        country: raw.country,
        phone: raw.phone,
    };
    (!address.is_blank()).then_some(address)
}

fn map_line_item(raw: RawLineItem) -> OrderItem {
    let total_price = if flex::to_opt_string(&raw.total).is_some() {
        flex::to_decimal(&raw.total)
    } else {
        raw.price * raw.quantity
    };
    OrderItem {
        id: raw.id,
        product_id: raw.product_id,
        product_name: raw.name,
        quantity: raw.quantity,
        unit_price: raw.price,
        total_price,
        sku: raw.sku,
        // WooCommerce reports 0 for simple products.
        variant_id: (!raw.variation_id.is_empty() && raw.variation_id != "0")
            .then_some(raw.variation_id),
    }
}

fn map_order(raw: RawOrder) -> Order {
    let customer_email = raw
        .billing
        .as_ref()
        .and_then(|b| b.email.clone())
        .unwrap_or_default();
    // `date_created_gmt` is zone-less UTC; `date_created` is site-local.
    let order_date = flex::to_datetime(
        raw.date_created_gmt
            .as_deref()
            .or(raw.date_created.as_deref()),
    );
    let order_number = if raw.number.is_empty() {
        raw.id.clone()
    } else {
        raw.number
    };

    Order {
        id: raw.id.clone(),
        order_number,
        customer_email,
        total_amount: raw.total,
        currency: raw.currency,
        status: raw.status,
        order_date,
        items: raw.line_items.into_iter().map(map_line_item).collect(),
        shipping_address: raw.shipping.and_then(map_address),
        billing_address: raw.billing.and_then(map_address),
        platform: PlatformType::WooCommerce,
        platform_order_id: raw.id,
        metadata: flex::metadata([
            (
                "customer_id",
                json!(
                    (!raw.customer_id.is_empty() && raw.customer_id != "0")
                        .then_some(raw.customer_id)
                ),
            ),
            ("payment_method_title", json!(raw.payment_method_title)),
        ]),
    }
}

fn map_customer(raw: RawCustomer) -> Customer {
    Customer {
        id: raw.id.clone(),
        email: raw.email,
        first_name: raw.first_name,
        last_name: raw.last_name,
        phone: raw.billing.and_then(|b| b.phone),
        platform: PlatformType::WooCommerce,
        platform_customer_id: raw.id,
        metadata: flex::metadata([
            ("username", json!(raw.username)),
            ("role", json!(raw.role)),
            ("date_created", json!(raw.date_created)),
        ]),
    }
}
