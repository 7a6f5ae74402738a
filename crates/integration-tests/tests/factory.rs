//! Adapter factory: initialization, caching and reload.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use socialspark_core::{PlatformType, builtin_platform_configs, features};
use socialspark_integration_tests::MockAdapter;
use socialspark_integrations::{
    db::{InMemoryStore, IntegrationStore},
    platforms::{AdapterFactory, AdapterRegistry, ApiClient, FactoryError, PlatformAdapter},
};

fn counting_registry(built: &Arc<AtomicUsize>) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    let built = Arc::clone(built);
    registry.register(PlatformType::Custom, move |_, _| {
        built.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockAdapter::new(PlatformType::Custom)) as Arc<dyn PlatformAdapter>
    });
    registry
}

fn factory(registry: AdapterRegistry, store: InMemoryStore) -> AdapterFactory {
    AdapterFactory::new(registry, Arc::new(store), ApiClient::new().unwrap())
}

#[tokio::test]
async fn test_adapter_is_built_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let factory = factory(counting_registry(&built), InMemoryStore::with_builtin_configs());
    factory.initialize().await.unwrap();

    let first = factory.create_adapter(PlatformType::Custom).await.unwrap();
    let second = factory.create_adapter_by_name("custom").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_before_initialize_fails() {
    let built = Arc::new(AtomicUsize::new(0));
    let factory = factory(counting_registry(&built), InMemoryStore::with_builtin_configs());

    let err = factory.create_adapter(PlatformType::Custom).await.err().unwrap();
    assert!(matches!(err, FactoryError::NotInitialized));
}

#[tokio::test]
async fn test_unknown_and_unregistered_platforms() {
    let built = Arc::new(AtomicUsize::new(0));
    let factory = factory(counting_registry(&built), InMemoryStore::with_builtin_configs());
    factory.initialize().await.unwrap();

    let err = factory.create_adapter_by_name("bigcommerce").await.err().unwrap();
    assert_eq!(err.to_string(), "Unsupported platform: bigcommerce");

    let err = factory.create_adapter(PlatformType::Magento).await.err().unwrap();
    assert_eq!(err.to_string(), "Unsupported platform: magento");
}

#[tokio::test]
async fn test_inactive_config_is_hidden() {
    let store = InMemoryStore::with_builtin_configs();
    let mut custom = builtin_platform_configs()
        .into_iter()
        .find(|c| c.platform == PlatformType::Custom)
        .unwrap();
    custom.is_active = false;
    store.upsert_platform_config(&custom).await.unwrap();

    let built = Arc::new(AtomicUsize::new(0));
    let factory = factory(counting_registry(&built), store);
    factory.initialize().await.unwrap();

    assert!(factory.create_adapter(PlatformType::Custom).await.is_err());
    assert!(factory.get_platform_config(PlatformType::Custom).await.is_none());
    assert_eq!(factory.get_all_platform_configs().await.len(), 3);
}

#[tokio::test]
async fn test_feature_lookup() {
    let factory = factory(
        AdapterRegistry::with_builtin_adapters(),
        InMemoryStore::with_builtin_configs(),
    );
    factory.initialize().await.unwrap();

    assert!(factory.supports_feature(PlatformType::Shopify, features::WEBHOOKS).await);
    assert!(!factory.supports_feature(PlatformType::Magento, features::WEBHOOKS).await);
    assert!(
        factory
            .get_required_fields(PlatformType::WooCommerce)
            .await
            .contains_key("site_url")
    );
}

#[tokio::test]
async fn test_reload_rebuilds_adapters() {
    let built = Arc::new(AtomicUsize::new(0));
    let factory = factory(counting_registry(&built), InMemoryStore::with_builtin_configs());
    factory.initialize().await.unwrap();
    factory.create_adapter(PlatformType::Custom).await.unwrap();

    factory.reload_configs().await.unwrap();
    factory.create_adapter(PlatformType::Custom).await.unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reload_racing_create_never_keeps_stale_adapter() {
    let built_from = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut registry = AdapterRegistry::new();
    let seen = Arc::clone(&built_from);
    registry.register(PlatformType::Custom, move |config, _| {
        seen.lock().unwrap().push(config.display_name);
        Arc::new(MockAdapter::new(PlatformType::Custom)) as Arc<dyn PlatformAdapter>
    });

    let store = Arc::new(InMemoryStore::with_builtin_configs());
    let factory = Arc::new(AdapterFactory::new(
        registry,
        Arc::clone(&store) as Arc<dyn IntegrationStore>,
        ApiClient::new().unwrap(),
    ));
    factory.initialize().await.unwrap();
    let mut custom = builtin_platform_configs()
        .into_iter()
        .find(|c| c.platform == PlatformType::Custom)
        .unwrap();

    for round in 0..20 {
        custom.display_name = format!("Custom v{round}");
        store.upsert_platform_config(&custom).await.unwrap();

        let creator = {
            let factory = Arc::clone(&factory);
            tokio::spawn(async move { factory.create_adapter(PlatformType::Custom).await })
        };
        factory.reload_configs().await.unwrap();
        creator.await.unwrap().unwrap();

        factory.create_adapter(PlatformType::Custom).await.unwrap();
        let last = built_from.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last, custom.display_name);
    }
}
