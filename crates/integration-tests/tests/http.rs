//! HTTP routes over the in-memory harness.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use socialspark_core::{PlatformType, UserId};
use socialspark_integration_tests::{MockAdapter, TestHarness, product};
use socialspark_integrations::middleware::USER_ID_HEADER;
use tower::ServiceExt;

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    user: Option<UserId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header(USER_ID_HEADER, user.to_string());
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn harness() -> TestHarness {
    let mut adapter = MockAdapter::new(PlatformType::Custom);
    adapter.products = vec![product(PlatformType::Custom, "p1")];
    TestHarness::new(MockAdapter::registry(&Arc::new(adapter))).await
}

fn connect_body() -> Value {
    json!({
        "platform": "custom",
        "credentials": {"base_url": "https://store.example", "api_key": "k"}
    })
}

#[tokio::test]
async fn test_health() {
    let router = harness().await.router();

    let (status, _) = call(&router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&router, Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_connections_require_user_header() {
    let router = harness().await.router();

    let (status, body) = call(&router, Method::GET, "/connections", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_connect_sync_and_list_products() {
    let router = harness().await.router();
    let user = UserId::generate();

    let (status, body) = call(
        &router,
        Method::POST,
        "/connections",
        Some(user),
        Some(connect_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Store connected successfully");
    let id = body["data"]["connection"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &router,
        Method::POST,
        &format!("/connections/{id}/sync"),
        Some(user),
        Some(json!({"sync_types": ["products"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items_synced"], 1);

    let (status, body) = call(
        &router,
        Method::GET,
        &format!("/connections/{id}/products?limit=10"),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = call(&router, Method::GET, "/connections", Some(user), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_other_user_gets_not_found() {
    let router = harness().await.router();
    let owner = UserId::generate();
    let (_, body) = call(
        &router,
        Method::POST,
        "/connections",
        Some(owner),
        Some(connect_body()),
    )
    .await;
    let id = body["data"]["connection"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &router,
        Method::DELETE,
        &format!("/connections/{id}"),
        Some(UserId::generate()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Store connection not found");
}

#[tokio::test]
async fn test_connect_unknown_platform_is_bad_request() {
    let router = harness().await.router();

    let (status, body) = call(
        &router,
        Method::POST,
        "/connections",
        Some(UserId::generate()),
        Some(json!({"platform": "bigcommerce", "credentials": {}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported platform: bigcommerce");
}

#[tokio::test]
async fn test_platform_fields_route() {
    let router = harness().await.router();

    let (status, body) = call(&router, Method::GET, "/platforms/shopify/fields", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"shop".to_string()));
    assert!(names.contains(&"accessToken".to_string()));
}

#[tokio::test]
async fn test_unsigned_webhook_for_unknown_connection() {
    let router = harness().await.router();

    let (status, body) = call(
        &router,
        Method::POST,
        &format!("/webhooks/shopify/{}", uuid::Uuid::new_v4()),
        None,
        Some(json!({"id": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}
