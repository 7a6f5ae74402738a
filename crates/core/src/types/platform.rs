//! Platform identifiers and static per-platform descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a platform type string does not name a known platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported platform: {0}")]
pub struct UnsupportedPlatform(pub String);

/// Third-party storefront platforms an adapter exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Shopify,
    #[serde(rename = "woocommerce")]
    WooCommerce,
    Magento,
    Custom,
}

impl PlatformType {
    /// Every shipped platform.
    pub const ALL: [Self; 4] = [Self::Shopify, Self::WooCommerce, Self::Magento, Self::Custom];

    /// Wire/database spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shopify => "shopify",
            Self::WooCommerce => "woocommerce",
            Self::Magento => "magento",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformType {
    type Err = UnsupportedPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shopify" => Ok(Self::Shopify),
            "woocommerce" => Ok(Self::WooCommerce),
            "magento" => Ok(Self::Magento),
            "custom" => Ok(Self::Custom),
            other => Err(UnsupportedPlatform(other.to_string())),
        }
    }
}

/// How a platform authenticates API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Oauth,
    #[default]
    ApiKey,
    Custom,
}

impl AuthMethod {
    /// Wire/database spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oauth => "oauth",
            Self::ApiKey => "api_key",
            Self::Custom => "custom",
        }
    }
}

/// Input type of a credential field, used to drive connect forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Url,
    Password,
}

/// Published API rate limits for a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RateLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
}

/// Static descriptor for one platform.
///
/// Loaded once when the adapter factory initializes and treated as immutable
/// until an explicit reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub platform: PlatformType,
    pub display_name: String,
    pub description: String,
    /// Credential fields the connect form must collect (name → input type).
    pub api_fields: BTreeMap<String, FieldType>,
    /// Feature flags such as `webhooks` or `inventory_sync`.
    #[serde(default)]
    pub supported_features: BTreeMap<String, bool>,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub rate_limits: RateLimits,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl PlatformConfig {
    /// Whether the platform advertises `feature`.
    #[must_use]
    pub fn supports(&self, feature: &str) -> bool {
        self.supported_features.get(feature).copied().unwrap_or(false)
    }
}

/// Well-known feature flag names.
pub mod features {
    pub const WEBHOOKS: &str = "webhooks";
    pub const INVENTORY_SYNC: &str = "inventory_sync";
    pub const ORDER_SYNC: &str = "order_sync";
    pub const CUSTOMER_SYNC: &str = "customer_sync";
}

fn fields(entries: &[(&str, FieldType)]) -> BTreeMap<String, FieldType> {
    entries
        .iter()
        .map(|(name, kind)| ((*name).to_string(), *kind))
        .collect()
}

fn flags(entries: &[(&str, bool)]) -> BTreeMap<String, bool> {
    entries
        .iter()
        .map(|(name, on)| ((*name).to_string(), *on))
        .collect()
}

/// Descriptors for the four shipped platforms.
///
/// These seed the `platform_configs` table and back the in-memory store.
#[must_use]
pub fn builtin_platform_configs() -> Vec<PlatformConfig> {
    use features::{CUSTOMER_SYNC, INVENTORY_SYNC, ORDER_SYNC, WEBHOOKS};

    vec![
        PlatformConfig {
            platform: PlatformType::Shopify,
            display_name: "Shopify".to_string(),
            description: "Connect your Shopify store with an Admin API access token".to_string(),
            api_fields: fields(&[
                ("shop", FieldType::Url),
                ("accessToken", FieldType::Password),
            ]),
            supported_features: flags(&[
                (WEBHOOKS, true),
                (INVENTORY_SYNC, true),
                (ORDER_SYNC, true),
                (CUSTOMER_SYNC, true),
            ]),
            auth_method: AuthMethod::Oauth,
            base_url: Some("https://{shop}/admin/api/2024-01".to_string()),
            rate_limits: RateLimits {
                requests_per_second: Some(2),
                requests_per_minute: Some(40),
            },
            is_active: true,
        },
        PlatformConfig {
            platform: PlatformType::WooCommerce,
            display_name: "WooCommerce".to_string(),
            description: "Connect a WordPress store through the WooCommerce REST API".to_string(),
            api_fields: fields(&[
                ("site_url", FieldType::Url),
                ("consumer_key", FieldType::Text),
                ("consumer_secret", FieldType::Password),
            ]),
            supported_features: flags(&[
                (WEBHOOKS, true),
                (INVENTORY_SYNC, true),
                (ORDER_SYNC, true),
                (CUSTOMER_SYNC, true),
            ]),
            auth_method: AuthMethod::ApiKey,
            base_url: Some("{site_url}/wp-json/wc/v3".to_string()),
            rate_limits: RateLimits {
                requests_per_second: None,
                requests_per_minute: Some(60),
            },
            is_active: true,
        },
        PlatformConfig {
            platform: PlatformType::Magento,
            display_name: "Magento".to_string(),
            description: "Connect Adobe Commerce / Magento 2 with an integration token".to_string(),
            api_fields: fields(&[
                ("base_url", FieldType::Url),
                ("access_token", FieldType::Password),
            ]),
            supported_features: flags(&[
                (WEBHOOKS, false),
                (INVENTORY_SYNC, true),
                (ORDER_SYNC, true),
                (CUSTOMER_SYNC, true),
            ]),
            auth_method: AuthMethod::Oauth,
            base_url: Some("{base_url}/rest/V1".to_string()),
            rate_limits: RateLimits::default(),
            is_active: true,
        },
        PlatformConfig {
            platform: PlatformType::Custom,
            display_name: "Custom API".to_string(),
            description: "Connect any storefront exposing the SocialSpark REST contract"
                .to_string(),
            api_fields: fields(&[
                ("base_url", FieldType::Url),
                ("api_key", FieldType::Password),
            ]),
            supported_features: flags(&[
                (WEBHOOKS, false),
                (ORDER_SYNC, true),
                (CUSTOMER_SYNC, true),
            ]),
            auth_method: AuthMethod::Custom,
            base_url: None,
            rate_limits: RateLimits::default(),
            is_active: true,
        },
    ]
}
