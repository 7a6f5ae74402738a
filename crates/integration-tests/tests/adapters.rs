//! Platform adapters against a local mock storefront.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use socialspark_core::{
    PlatformConfig, PlatformCredentials, PlatformType, ProductStatus, SyncOptions,
    builtin_platform_configs,
};
use socialspark_integration_tests::MockStorefront;
use socialspark_integrations::platforms::{
    AdapterError, ApiClient, CustomAdapter, MagentoAdapter, PlatformAdapter, ShopifyAdapter,
    WooCommerceAdapter,
};

/// Nothing listens on the discard port, so connections are refused.
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn config(platform: PlatformType) -> PlatformConfig {
    builtin_platform_configs()
        .into_iter()
        .find(|c| c.platform == platform)
        .unwrap()
}

fn shopify_credentials(shop: &str) -> PlatformCredentials {
    PlatformCredentials::from_fields(
        PlatformType::Shopify,
        json!({"shop": shop, "accessToken": "shpat_test"}),
    )
    .unwrap()
}

fn magento_credentials(base_url: &str) -> PlatformCredentials {
    PlatformCredentials::from_fields(
        PlatformType::Magento,
        json!({"base_url": base_url, "access_token": "mg_token"}),
    )
    .unwrap()
}

fn custom_credentials(base_url: &str) -> PlatformCredentials {
    PlatformCredentials::from_fields(
        PlatformType::Custom,
        json!({"base_url": base_url, "api_key": "ck_live"}),
    )
    .unwrap()
}

/// Adapter, credential builder and the path its credential check requests.
struct Case {
    adapter: Box<dyn PlatformAdapter>,
    credentials: fn(&str) -> PlatformCredentials,
    validate_path: &'static str,
}

fn every_adapter() -> Vec<Case> {
    let http = ApiClient::new().unwrap();
    vec![
        Case {
            adapter: Box::new(ShopifyAdapter::new(config(PlatformType::Shopify), http.clone())),
            credentials: shopify_credentials,
            validate_path: "/admin/api/2024-01/shop.json",
        },
        Case {
            adapter: Box::new(WooCommerceAdapter::new(
                config(PlatformType::WooCommerce),
                http.clone(),
            )),
            credentials: woo_credentials,
            validate_path: "/wp-json/wc/v3/system_status",
        },
        Case {
            adapter: Box::new(MagentoAdapter::new(config(PlatformType::Magento), http.clone())),
            credentials: magento_credentials,
            validate_path: "/rest/V1/store/storeConfigs",
        },
        Case {
            adapter: Box::new(CustomAdapter::new(config(PlatformType::Custom), http)),
            credentials: custom_credentials,
            validate_path: "/health",
        },
    ]
}

fn woo_credentials(site_url: &str) -> PlatformCredentials {
    PlatformCredentials::from_fields(
        PlatformType::WooCommerce,
        json!({"site_url": site_url, "consumer_key": "ck_1", "consumer_secret": "cs_1"}),
    )
    .unwrap()
}

// =============================================================================
// Shopify
// =============================================================================

#[tokio::test]
async fn test_shopify_store_info() {
    let server = MockStorefront::builder()
        .json(
            "/admin/api/2024-01/shop.json",
            json!({"shop": {
                "id": 1,
                "name": "Foo Store",
                "domain": "foo.myshopify.com",
                "currency": "USD",
                "iana_timezone": "America/New_York"
            }}),
        )
        .start()
        .await;
    let adapter = ShopifyAdapter::new(config(PlatformType::Shopify), ApiClient::new().unwrap());
    let credentials = shopify_credentials(&server.base_url);

    assert!(adapter.validate_credentials(&credentials).await);
    let info = adapter.get_store_info(&credentials).await.unwrap();

    assert_eq!(info.name, "Foo Store");
    assert_eq!(info.currency.as_deref(), Some("USD"));
    assert_eq!(info.platform, PlatformType::Shopify);

    let requests = server.requests_to("/admin/api/2024-01/shop.json");
    assert!(!requests.is_empty());
    assert_eq!(
        requests[0].headers.get("x-shopify-access-token").unwrap(),
        "shpat_test"
    );
}

#[tokio::test]
async fn test_shopify_rejected_token_is_invalid() {
    let server = MockStorefront::builder()
        .status("/admin/api/2024-01/shop.json", StatusCode::UNAUTHORIZED)
        .start()
        .await;
    let adapter = ShopifyAdapter::new(config(PlatformType::Shopify), ApiClient::new().unwrap());
    let credentials = shopify_credentials(&server.base_url);

    assert!(!adapter.validate_credentials(&credentials).await);
    assert!(!adapter.test_connection(&credentials).await);
}

#[tokio::test]
async fn test_shopify_products_honor_limit() {
    let server = MockStorefront::builder()
        .json(
            "/admin/api/2024-01/products.json",
            json!({"products": [{
                "id": 632_910_392,
                "title": "IPod Nano",
                "status": "active",
                "tags": "music, gadgets",
                "variants": [{
                    "id": 808_950_810,
                    "sku": "IPOD2008",
                    "price": "199.00",
                    "inventory_quantity": 10
                }],
                "images": [{"src": "https://cdn.example/ipod.png"}]
            }]}),
        )
        .start()
        .await;
    let adapter = ShopifyAdapter::new(config(PlatformType::Shopify), ApiClient::new().unwrap());
    let credentials = shopify_credentials(&server.base_url);

    let products = adapter
        .get_products(&credentials, &SyncOptions::with_limit(10))
        .await
        .unwrap();

    assert_eq!(products.len(), 1);
    let product = &products[0];
    assert_eq!(product.platform_product_id, "632910392");
    assert_eq!(product.name, "IPod Nano");
    assert_eq!(product.price, Decimal::new(19900, 2));
    assert_eq!(product.images, vec!["https://cdn.example/ipod.png".to_string()]);

    let request = &server.requests_to("/admin/api/2024-01/products.json")[0];
    assert_eq!(request.query.as_deref(), Some("limit=10"));
}

#[tokio::test]
async fn test_shopify_server_error_is_transient() {
    let server = MockStorefront::builder()
        .status("/admin/api/2024-01/orders.json", StatusCode::SERVICE_UNAVAILABLE)
        .start()
        .await;
    let adapter = ShopifyAdapter::new(config(PlatformType::Shopify), ApiClient::new().unwrap());

    let err = adapter
        .get_orders(&shopify_credentials(&server.base_url), &SyncOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_transient(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_credentials_for_other_platform_are_rejected() {
    let adapter = ShopifyAdapter::new(config(PlatformType::Shopify), ApiClient::new().unwrap());
    let credentials = woo_credentials(UNREACHABLE);

    let err = adapter.get_store_info(&credentials).await.unwrap_err();
    assert!(matches!(err, AdapterError::CredentialMismatch { .. }));
    assert!(!adapter.validate_credentials(&credentials).await);
}

// =============================================================================
// WooCommerce
// =============================================================================

#[tokio::test]
async fn test_woocommerce_maps_products() {
    let server = MockStorefront::builder()
        .json(
            "/wp-json/wc/v3/products",
            json!([{
                "id": 5,
                "name": "Mug",
                "price": "9.99",
                "regular_price": "12.00",
                "stock_quantity": 3,
                "status": "publish",
                "images": [{"src": "a.jpg"}],
                "categories": [{"name": "Kitchen"}]
            }]),
        )
        .start()
        .await;
    let adapter =
        WooCommerceAdapter::new(config(PlatformType::WooCommerce), ApiClient::new().unwrap());

    let products = adapter
        .get_products(&woo_credentials(&server.base_url), &SyncOptions::with_limit(25))
        .await
        .unwrap();

    assert_eq!(products.len(), 1);
    let mug = &products[0];
    assert_eq!(mug.platform_product_id, "5");
    assert_eq!(mug.name, "Mug");
    assert_eq!(mug.price, Decimal::new(999, 2));
    assert_eq!(mug.inventory, 3);
    assert_eq!(mug.status, ProductStatus::Active);
    assert_eq!(mug.images, vec!["a.jpg".to_string()]);
    assert_eq!(mug.categories, vec!["Kitchen".to_string()]);
    assert_eq!(mug.metadata["platform_status"], "publish");

    let request = &server.requests_to("/wp-json/wc/v3/products")[0];
    assert_eq!(request.query.as_deref(), Some("per_page=25"));
    assert!(request.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_woocommerce_store_info_without_currency() {
    let server = MockStorefront::builder()
        .json(
            "/wp-json",
            json!({"name": "Bar Goods", "home": "https://bar.example", "timezone_string": "UTC"}),
        )
        .start()
        .await;
    let adapter =
        WooCommerceAdapter::new(config(PlatformType::WooCommerce), ApiClient::new().unwrap());

    let info = adapter
        .get_store_info(&woo_credentials(&server.base_url))
        .await
        .unwrap();

    assert_eq!(info.name, "Bar Goods");
    assert_eq!(info.domain, "https://bar.example");
    assert_eq!(info.currency, None);
    assert_eq!(info.timezone.as_deref(), Some("UTC"));
}

#[tokio::test]
async fn test_woocommerce_setup_webhooks_not_supported() {
    let adapter =
        WooCommerceAdapter::new(config(PlatformType::WooCommerce), ApiClient::new().unwrap());

    let err = adapter
        .setup_webhooks(&woo_credentials(UNREACHABLE), "https://cb.example")
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::NotSupported(_)));
}

// =============================================================================
// Credential validation across platforms
// =============================================================================

#[tokio::test]
async fn test_rejected_credentials_are_invalid_on_every_platform() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::INTERNAL_SERVER_ERROR] {
        for case in every_adapter() {
            let server = MockStorefront::builder()
                .status(case.validate_path, status)
                .start()
                .await;
            let credentials = (case.credentials)(&server.base_url);

            assert!(
                !case.adapter.validate_credentials(&credentials).await,
                "{} accepted credentials on {status}",
                case.adapter.platform()
            );
            assert_eq!(server.requests_to(case.validate_path).len(), 1);
        }
    }
}

#[tokio::test]
async fn test_unreachable_store_is_invalid_on_every_platform() {
    for case in every_adapter() {
        let credentials = (case.credentials)(UNREACHABLE);
        assert!(
            !case.adapter.validate_credentials(&credentials).await,
            "{} accepted an unreachable store",
            case.adapter.platform()
        );
        assert!(!case.adapter.test_connection(&credentials).await);
    }
}

// =============================================================================
// Magento
// =============================================================================

#[tokio::test]
async fn test_magento_fetches_one_page_per_entity() {
    let server = MockStorefront::builder()
        .json(
            "/rest/V1/products",
            json!({"items": [{
                "id": 14,
                "sku": "MB01",
                "name": "Joust Duffle Bag",
                "price": 34,
                "status": 1,
                "extension_attributes": {"stock_item": {"qty": 7, "is_in_stock": true}},
                "media_gallery_entries": [{"file": "/m/b/mb01.jpg", "disabled": false}]
            }], "total_count": 1}),
        )
        .json(
            "/rest/V1/orders",
            json!({"items": [{
                "entity_id": 3,
                "increment_id": "000000003",
                "customer_email": "roni@example.com",
                "grand_total": "36.39",
                "order_currency_code": "USD",
                "status": "pending",
                "items": []
            }]}),
        )
        .json(
            "/rest/V1/customers/search",
            json!({"items": [{
                "id": 1,
                "email": "roni@example.com",
                "firstname": "Veronica",
                "lastname": "Costello"
            }]}),
        )
        .start()
        .await;
    let adapter = MagentoAdapter::new(config(PlatformType::Magento), ApiClient::new().unwrap());
    let credentials = magento_credentials(&server.base_url);
    let options = SyncOptions::with_limit(25);

    let products = adapter.get_products(&credentials, &options).await.unwrap();
    let orders = adapter.get_orders(&credentials, &options).await.unwrap();
    let customers = adapter.get_customers(&credentials, &options).await.unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].platform_product_id, "14");
    assert_eq!(products[0].price, Decimal::new(34, 0));
    assert_eq!(products[0].inventory, 7);
    assert_eq!(products[0].status, ProductStatus::Active);
    assert_eq!(
        products[0].images,
        vec![format!("{}/media/catalog/product/m/b/mb01.jpg", server.base_url)]
    );
    assert_eq!(orders[0].order_number, "000000003");
    assert_eq!(orders[0].total_amount, Decimal::new(3639, 2));
    assert_eq!(orders[0].currency, "USD");
    assert_eq!(customers[0].first_name, "Veronica");

    for path in ["/rest/V1/products", "/rest/V1/orders", "/rest/V1/customers/search"] {
        let requests = server.requests_to(path);
        assert_eq!(requests.len(), 1, "{path}");
        assert_eq!(
            requests[0].query.as_deref(),
            Some("searchCriteria%5BpageSize%5D=25"),
            "{path}"
        );
        assert_eq!(requests[0].headers.get("authorization").unwrap(), "Bearer mg_token");
    }
}

// =============================================================================
// Custom
// =============================================================================

#[tokio::test]
async fn test_custom_fetches_one_page_per_entity() {
    let server = MockStorefront::builder()
        .json(
            "/products",
            json!({"data": [{"id": "sku-1", "name": "Tote", "price": "18.50", "status": "draft"}]}),
        )
        .json(
            "/orders",
            json!([{"id": 42, "number": "R-42", "email": "a@example.com", "total": 20}]),
        )
        .json(
            "/customers",
            json!({"customers": [{"id": 7, "email": "a@example.com", "firstname": "Ada"}]}),
        )
        .start()
        .await;
    let adapter = CustomAdapter::new(config(PlatformType::Custom), ApiClient::new().unwrap());
    let credentials = custom_credentials(&server.base_url);
    let options = SyncOptions::with_limit(7);

    let products = adapter.get_products(&credentials, &options).await.unwrap();
    let orders = adapter.get_orders(&credentials, &options).await.unwrap();
    let customers = adapter.get_customers(&credentials, &options).await.unwrap();

    assert_eq!(products[0].platform_product_id, "sku-1");
    assert_eq!(products[0].price, Decimal::new(1850, 2));
    assert_eq!(products[0].status, ProductStatus::Draft);
    assert_eq!(orders[0].order_number, "R-42");
    assert_eq!(orders[0].customer_email, "a@example.com");
    assert_eq!(customers[0].first_name, "Ada");
    assert_eq!(customers[0].platform_customer_id, "7");

    for path in ["/products", "/orders", "/customers"] {
        let requests = server.requests_to(path);
        assert_eq!(requests.len(), 1, "{path}");
        assert_eq!(requests[0].query.as_deref(), Some("limit=7"), "{path}");
        assert_eq!(requests[0].headers.get("authorization").unwrap(), "Bearer ck_live");
    }
}
