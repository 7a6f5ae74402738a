//! Platform credential types.
//!
//! Credentials arrive from connect forms as an open key/value bag. They are
//! parsed into a tagged union keyed by platform so every adapter gets exactly
//! the fields its auth scheme needs. `Debug` output never includes secrets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::platform::PlatformType;

/// Errors raised while turning a credential bag into [`PlatformCredentials`].
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// The credential payload was not a JSON object.
    #[error("Credentials must be a JSON object")]
    NotAnObject,

    /// A required field is absent or blank.
    #[error("Missing required credential field: {0}")]
    MissingField(String),

    /// Fields were present but had the wrong shape.
    #[error("Invalid credentials: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Shopify Admin API credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopifyCredentials {
    /// Shop domain, e.g. `foo.myshopify.com`.
    pub shop: String,
    /// Admin API access token (`shpat_...`).
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: String,
    /// App shared secret used to sign webhook deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for ShopifyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyCredentials")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// WooCommerce REST API credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WooCommerceCredentials {
    pub site_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Secret configured on the WooCommerce webhook, if it differs from the
    /// consumer secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for WooCommerceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WooCommerceCredentials")
            .field("site_url", &self.site_url)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Magento 2 integration-token credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagentoCredentials {
    pub base_url: String,
    pub access_token: String,
}

impl std::fmt::Debug for MagentoCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagentoCredentials")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Credentials for a store exposing the custom REST contract.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCredentials {
    pub base_url: String,
    pub api_key: String,
    /// Any additional fields the custom backend expects; passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for CustomCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("extra_fields", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Credentials for one platform connection.
///
/// Serialized with a `platform` tag so an encrypted blob can be decrypted
/// without knowing which platform it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform")]
pub enum PlatformCredentials {
    #[serde(rename = "shopify")]
    Shopify(ShopifyCredentials),
    #[serde(rename = "woocommerce")]
    WooCommerce(WooCommerceCredentials),
    #[serde(rename = "magento")]
    Magento(MagentoCredentials),
    #[serde(rename = "custom")]
    Custom(CustomCredentials),
}

impl PlatformCredentials {
    /// Parse an open credential bag for `platform`.
    ///
    /// # Errors
    ///
    /// Returns `CredentialsError::MissingField` when a required field is absent
    /// or blank, and `CredentialsError::Invalid` when a field has the wrong type.
    pub fn from_fields(platform: PlatformType, fields: Value) -> Result<Self, CredentialsError> {
        let Value::Object(mut map) = fields else {
            return Err(CredentialsError::NotAnObject);
        };
        // A stray tag from the client must not override the requested platform.
        map.remove("platform");

        for required in required_fields(platform) {
            let present = required.iter().any(|name| {
                map.get(*name)
                    .and_then(Value::as_str)
                    .is_some_and(|v| !v.trim().is_empty())
            });
            if !present {
                let name = required.first().copied().unwrap_or_default();
                return Err(CredentialsError::MissingField(name.to_string()));
            }
        }

        let value = Value::Object(map);
        let credentials = match platform {
            PlatformType::Shopify => Self::Shopify(serde_json::from_value(value)?),
            PlatformType::WooCommerce => Self::WooCommerce(serde_json::from_value(value)?),
            PlatformType::Magento => Self::Magento(serde_json::from_value(value)?),
            PlatformType::Custom => Self::Custom(serde_json::from_value(value)?),
        };
        Ok(credentials)
    }

    /// The platform these credentials belong to.
    #[must_use]
    pub const fn platform(&self) -> PlatformType {
        match self {
            Self::Shopify(_) => PlatformType::Shopify,
            Self::WooCommerce(_) => PlatformType::WooCommerce,
            Self::Magento(_) => PlatformType::Magento,
            Self::Custom(_) => PlatformType::Custom,
        }
    }

    #[must_use]
    pub const fn as_shopify(&self) -> Option<&ShopifyCredentials> {
        match self {
            Self::Shopify(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_woocommerce(&self) -> Option<&WooCommerceCredentials> {
        match self {
            Self::WooCommerce(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_magento(&self) -> Option<&MagentoCredentials> {
        match self {
            Self::Magento(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_custom(&self) -> Option<&CustomCredentials> {
        match self {
            Self::Custom(c) => Some(c),
            _ => None,
        }
    }
}

/// Required fields per platform; each inner slice lists accepted spellings.
fn required_fields(platform: PlatformType) -> &'static [&'static [&'static str]] {
    match platform {
        PlatformType::Shopify => &[&["shop"], &["accessToken", "access_token"]],
        PlatformType::WooCommerce => &[&["site_url"], &["consumer_key"], &["consumer_secret"]],
        PlatformType::Magento => &[&["base_url"], &["access_token"]],
        PlatformType::Custom => &[&["base_url"], &["api_key"]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_fields_shopify() {
        let creds = PlatformCredentials::from_fields(
            PlatformType::Shopify,
            json!({"shop": "foo.myshopify.com", "accessToken": "shpat_x"}),
        )
        .expect("valid credentials");

        let shopify = creds.as_shopify().expect("shopify variant");
        assert_eq!(shopify.shop, "foo.myshopify.com");
        assert_eq!(shopify.access_token, "shpat_x");
        assert_eq!(creds.platform(), PlatformType::Shopify);
    }

    #[test]
    fn test_from_fields_accepts_snake_case_token() {
        let creds = PlatformCredentials::from_fields(
            PlatformType::Shopify,
            json!({"shop": "foo.myshopify.com", "access_token": "shpat_x"}),
        );
        assert!(creds.is_ok());
    }

    #[test]
    fn test_from_fields_missing_field() {
        let err = PlatformCredentials::from_fields(
            PlatformType::WooCommerce,
            json!({"site_url": "https://shop.example", "consumer_key": "ck_1"}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing required credential field: consumer_secret");
    }

    #[test]
    fn test_from_fields_blank_field_is_missing() {
        let err = PlatformCredentials::from_fields(
            PlatformType::Magento,
            json!({"base_url": "https://m.example", "access_token": "   "}),
        )
        .unwrap_err();
        assert!(matches!(err, CredentialsError::MissingField(f) if f == "access_token"));
    }

    #[test]
    fn test_from_fields_rejects_non_object() {
        let err =
            PlatformCredentials::from_fields(PlatformType::Custom, json!("token")).unwrap_err();
        assert!(matches!(err, CredentialsError::NotAnObject));
    }

    #[test]
    fn test_custom_keeps_extra_fields() {
        let creds = PlatformCredentials::from_fields(
            PlatformType::Custom,
            json!({"base_url": "https://api.example", "api_key": "k", "tenant": "acme"}),
        )
        .expect("valid credentials");
        let custom = creds.as_custom().expect("custom variant");
        assert_eq!(custom.extra.get("tenant"), Some(&json!("acme")));
    }

    #[test]
    fn test_tagged_serde_roundtrip() {
        let creds = PlatformCredentials::from_fields(
            PlatformType::Magento,
            json!({"base_url": "https://m.example", "access_token": "tok"}),
        )
        .expect("valid credentials");
        let json = serde_json::to_value(&creds).expect("serialize");
        assert_eq!(json["platform"], "magento");
        let back: PlatformCredentials = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, creds);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = PlatformCredentials::from_fields(
            PlatformType::WooCommerce,
            json!({
                "site_url": "https://shop.example",
                "consumer_key": "ck_1",
                "consumer_secret": "cs_super_secret"
            }),
        )
        .expect("valid credentials");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("cs_super_secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
