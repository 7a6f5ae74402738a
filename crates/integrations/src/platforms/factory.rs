//! Adapter registry and factory.
//!
//! The registry maps each platform to a constructor. The factory loads
//! platform descriptors from the store once, then hands out one shared adapter
//! instance per platform, built on first use.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use moka::future::Cache;
use socialspark_core::{AuthMethod, FieldType, PlatformConfig, PlatformType, UnsupportedPlatform};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

use super::{
    ApiClient, CustomAdapter, MagentoAdapter, PlatformAdapter, ShopifyAdapter, WooCommerceAdapter,
};
use crate::db::{IntegrationStore, RepositoryError};

/// Builds an adapter from its platform descriptor and the shared HTTP client.
pub type AdapterConstructor =
    Arc<dyn Fn(PlatformConfig, ApiClient) -> Arc<dyn PlatformAdapter> + Send + Sync>;

/// Errors from the adapter factory.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Adapter factory not initialized")]
    NotInitialized,

    #[error(transparent)]
    Unsupported(#[from] UnsupportedPlatform),

    #[error("Failed to load platform configs: {0}")]
    Repository(#[from] RepositoryError),
}

/// Platform → adapter constructor.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    constructors: HashMap<PlatformType, AdapterConstructor>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut platforms: Vec<_> = self.constructors.keys().collect();
        platforms.sort();
        f.debug_struct("AdapterRegistry")
            .field("platforms", &platforms)
            .finish()
    }
}

impl AdapterRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four shipped adapters.
    #[must_use]
    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::new();
        registry.register(PlatformType::Shopify, |config, http| {
            Arc::new(ShopifyAdapter::new(config, http))
        });
        registry.register(PlatformType::WooCommerce, |config, http| {
            Arc::new(WooCommerceAdapter::new(config, http))
        });
        registry.register(PlatformType::Magento, |config, http| {
            Arc::new(MagentoAdapter::new(config, http))
        });
        registry.register(PlatformType::Custom, |config, http| {
            Arc::new(CustomAdapter::new(config, http))
        });
        registry
    }

    /// Register (or replace) the constructor for `platform`.
    pub fn register<F>(&mut self, platform: PlatformType, constructor: F) -> &mut Self
    where
        F: Fn(PlatformConfig, ApiClient) -> Arc<dyn PlatformAdapter> + Send + Sync + 'static,
    {
        self.constructors.insert(platform, Arc::new(constructor));
        self
    }

    #[must_use]
    pub fn is_registered(&self, platform: PlatformType) -> bool {
        self.constructors.contains_key(&platform)
    }

    fn get(&self, platform: PlatformType) -> Option<AdapterConstructor> {
        self.constructors.get(&platform).cloned()
    }
}

/// Creates and caches platform adapters.
pub struct AdapterFactory {
    registry: AdapterRegistry,
    store: Arc<dyn IntegrationStore>,
    http: ApiClient,
    /// `None` until `initialize` has run.
    configs: RwLock<Option<HashMap<PlatformType, PlatformConfig>>>,
    instances: Cache<PlatformType, Arc<dyn PlatformAdapter>>,
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("registry", &self.registry)
            .field("cached_adapters", &self.instances.entry_count())
            .finish_non_exhaustive()
    }
}

impl AdapterFactory {
    #[must_use]
    pub fn new(
        registry: AdapterRegistry,
        store: Arc<dyn IntegrationStore>,
        http: ApiClient,
    ) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let capacity = PlatformType::ALL.len() as u64;
        Self {
            registry,
            store,
            http,
            configs: RwLock::new(None),
            instances: Cache::new(capacity),
        }
    }

    /// Load platform descriptors. Calling again after success is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Repository` if the configs cannot be loaded.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), FactoryError> {
        let mut guard = self.configs.write().await;
        if guard.is_some() {
            return Ok(());
        }
        *guard = Some(self.load_configs().await?);
        Ok(())
    }

    /// Drop cached descriptors and adapters, then load descriptors again.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Repository` if the configs cannot be loaded. The
    /// factory is left uninitialized in that case.
    #[instrument(skip(self))]
    pub async fn reload_configs(&self) -> Result<(), FactoryError> {
        let mut guard = self.configs.write().await;
        *guard = None;
        self.instances.invalidate_all();
        *guard = Some(self.load_configs().await?);
        Ok(())
    }

    async fn load_configs(&self) -> Result<HashMap<PlatformType, PlatformConfig>, FactoryError> {
        let configs: HashMap<_, _> = self
            .store
            .load_platform_configs()
            .await?
            .into_iter()
            .filter(|c| c.is_active)
            .map(|c| (c.platform, c))
            .collect();
        tracing::info!(platforms = configs.len(), "Loaded platform configs");
        Ok(configs)
    }

    /// Shared adapter for `platform`.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::NotInitialized` before [`Self::initialize`], and
    /// `FactoryError::Unsupported` when the platform has no active config or
    /// no registered constructor.
    pub async fn create_adapter(
        &self,
        platform: PlatformType,
    ) -> Result<Arc<dyn PlatformAdapter>, FactoryError> {
        // Held until the adapter is cached so a concurrent reload cannot
        // invalidate first and then see a stale adapter re-inserted.
        let guard = self.configs.read().await;
        let configs = guard.as_ref().ok_or(FactoryError::NotInitialized)?;
        let config = configs
            .get(&platform)
            .cloned()
            .ok_or_else(|| UnsupportedPlatform(platform.to_string()))?;
        let constructor = self
            .registry
            .get(platform)
            .ok_or_else(|| UnsupportedPlatform(platform.to_string()))?;

        let http = self.http.clone();
        let adapter = self
            .instances
            .get_with(platform, async move {
                tracing::debug!(%platform, "Creating platform adapter");
                constructor(config, http)
            })
            .await;
        drop(guard);
        Ok(adapter)
    }

    /// Parse `name` and delegate to [`Self::create_adapter`].
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Unsupported` for unknown platform names.
    pub async fn create_adapter_by_name(
        &self,
        name: &str,
    ) -> Result<Arc<dyn PlatformAdapter>, FactoryError> {
        let platform = name.parse::<PlatformType>()?;
        self.create_adapter(platform).await
    }

    async fn with_config<T>(
        &self,
        platform: PlatformType,
        f: impl FnOnce(&PlatformConfig) -> T,
    ) -> Option<T> {
        let guard = self.configs.read().await;
        guard.as_ref()?.get(&platform).map(f)
    }

    /// Whether `platform` advertises `feature`. `false` for unknown platforms.
    pub async fn supports_feature(&self, platform: PlatformType, feature: &str) -> bool {
        self.with_config(platform, |c| c.supports(feature))
            .await
            .unwrap_or(false)
    }

    /// Credential fields for `platform`. Empty for unknown platforms.
    pub async fn get_required_fields(&self, platform: PlatformType) -> BTreeMap<String, FieldType> {
        self.with_config(platform, |c| c.api_fields.clone())
            .await
            .unwrap_or_default()
    }

    /// Auth method for `platform`. `api_key` for unknown platforms.
    pub async fn get_auth_method(&self, platform: PlatformType) -> AuthMethod {
        self.with_config(platform, |c| c.auth_method)
            .await
            .unwrap_or_default()
    }

    pub async fn get_platform_config(&self, platform: PlatformType) -> Option<PlatformConfig> {
        self.with_config(platform, Clone::clone).await
    }

    /// Every loaded descriptor, ordered by platform.
    pub async fn get_all_platform_configs(&self) -> Vec<PlatformConfig> {
        let guard = self.configs.read().await;
        let mut configs: Vec<_> = guard
            .as_ref()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        configs.sort_by_key(|c| c.platform);
        configs
    }

    /// Platforms with both an active descriptor and a registered adapter.
    pub async fn supported_platforms(&self) -> Vec<PlatformType> {
        let guard = self.configs.read().await;
        let mut platforms: Vec<_> = guard
            .as_ref()
            .map(|m| {
                m.keys()
                    .copied()
                    .filter(|p| self.registry.is_registered(*p))
                    .collect()
            })
            .unwrap_or_default();
        platforms.sort();
        platforms
    }
}
