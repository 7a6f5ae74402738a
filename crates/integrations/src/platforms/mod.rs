//! Platform adapters.
//!
//! One adapter per third-party storefront platform. Every adapter speaks the
//! same [`PlatformAdapter`] contract, so the factory, the sync service and the
//! API façade never branch on platform.
//!
//! Adapters are stateless with respect to credentials: credentials are a call
//! parameter, never instance state. A single instance per platform is shared
//! across every connection on that platform.

mod custom;
mod factory;
mod flex;
mod http;
mod magento;
mod shopify;
mod webhook;
mod woocommerce;

pub use custom::CustomAdapter;
pub use factory::{AdapterConstructor, AdapterFactory, AdapterRegistry, FactoryError};
pub use http::ApiClient;
pub use magento::MagentoAdapter;
pub use shopify::ShopifyAdapter;
pub use woocommerce::WooCommerceAdapter;

use async_trait::async_trait;
use socialspark_core::{
    Customer, Order, PlatformConfig, PlatformCredentials, PlatformType, Product, ProductUpdate,
    StoreInfo, SyncOptions,
};
use thiserror::Error;

/// Errors returned by platform adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform returned a non-success response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credentials were rejected (401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the platform.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A shop, site or base URL could not be turned into a request URL.
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),

    /// Credentials for one platform were handed to another platform's adapter.
    #[error("Credentials for {actual} cannot be used with {expected}")]
    CredentialMismatch {
        expected: PlatformType,
        actual: PlatformType,
    },

    /// Operation is not implemented for this platform.
    #[error("{0}")]
    NotSupported(String),
}

impl AdapterError {
    fn not_supported(operation: &str, platform: PlatformType) -> Self {
        Self::NotSupported(format!("{operation} is not supported for {platform}"))
    }

    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Common contract implemented by every storefront adapter.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform this adapter talks to.
    fn platform(&self) -> PlatformType;

    /// Static descriptor the adapter was built with.
    fn config(&self) -> &PlatformConfig;

    /// Lightweight authenticated request. Never errors: any failure is `false`.
    async fn validate_credentials(&self, credentials: &PlatformCredentials) -> bool;

    /// Store name, domain, currency and timezone.
    async fn get_store_info(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<StoreInfo, AdapterError>;

    /// Whether store info can currently be fetched with these credentials.
    async fn test_connection(&self, credentials: &PlatformCredentials) -> bool {
        match self.get_store_info(credentials).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(platform = %self.platform(), error = %e, "Connection test failed");
                false
            }
        }
    }

    /// One page of products, at most `options.limit` items.
    async fn get_products(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Product>, AdapterError>;

    /// One page of orders, at most `options.limit` items.
    async fn get_orders(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Order>, AdapterError>;

    /// One page of customers, at most `options.limit` items.
    async fn get_customers(
        &self,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<Vec<Customer>, AdapterError>;

    /// Single product by platform id.
    async fn get_product(
        &self,
        credentials: &PlatformCredentials,
        platform_product_id: &str,
    ) -> Result<Option<Product>, AdapterError> {
        let products = self.get_products(credentials, &SyncOptions::default()).await?;
        Ok(products
            .into_iter()
            .find(|p| p.platform_product_id == platform_product_id))
    }

    /// Single order by platform id.
    async fn get_order(
        &self,
        credentials: &PlatformCredentials,
        platform_order_id: &str,
    ) -> Result<Option<Order>, AdapterError> {
        let orders = self.get_orders(credentials, &SyncOptions::default()).await?;
        Ok(orders
            .into_iter()
            .find(|o| o.platform_order_id == platform_order_id))
    }

    async fn update_inventory(
        &self,
        _credentials: &PlatformCredentials,
        _platform_product_id: &str,
        _quantity: u32,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::not_supported("Inventory update", self.platform()))
    }

    async fn update_product(
        &self,
        _credentials: &PlatformCredentials,
        _platform_product_id: &str,
        _update: &ProductUpdate,
    ) -> Result<Product, AdapterError> {
        Err(AdapterError::not_supported("Product update", self.platform()))
    }

    async fn update_order_status(
        &self,
        _credentials: &PlatformCredentials,
        _platform_order_id: &str,
        _status: &str,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::not_supported("Order status update", self.platform()))
    }

    /// Register platform webhooks pointing at `callback_url`.
    async fn setup_webhooks(
        &self,
        _credentials: &PlatformCredentials,
        _callback_url: &str,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::not_supported("Webhook setup", self.platform()))
    }

    async fn remove_webhooks(
        &self,
        _credentials: &PlatformCredentials,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::not_supported("Webhook removal", self.platform()))
    }

    /// Verify an inbound webhook signature. Platforms without signing accept everything.
    fn validate_webhook(
        &self,
        _credentials: &PlatformCredentials,
        _payload: &[u8],
        _signature: Option<&str>,
    ) -> bool {
        true
    }
}

/// Reject credentials belonging to a different platform.
fn mismatch(expected: PlatformType, credentials: &PlatformCredentials) -> AdapterError {
    AdapterError::CredentialMismatch {
        expected,
        actual: credentials.platform(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_supported_message() {
        let err = AdapterError::not_supported("Webhook setup", PlatformType::Magento);
        assert_eq!(err.to_string(), "Webhook setup is not supported for magento");
    }

    #[test]
    fn test_transient_classification() {
        assert!(AdapterError::RateLimited(2).is_transient());
        assert!(
            AdapterError::Api {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !AdapterError::Api {
                status: 404,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!AdapterError::Unauthorized("bad token".to_string()).is_transient());
    }
}
