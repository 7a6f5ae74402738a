//! Normalized store entities.
//!
//! Every adapter maps its platform-native payloads into these shapes, so the
//! sync service and persistence layer never see platform-specific JSON.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::platform::PlatformType;
use super::status::ProductStatus;

/// Opaque, platform-specific passthrough data.
pub type Metadata = Map<String, Value>;

/// Store metadata returned by a successful credential check.
///
/// Not persisted on its own; folded into the connection row on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub platform: PlatformType,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A normalized product.
///
/// `(user, connection, platform_product_id)` is the upsert key once synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// Units on hand; negative platform stock is clamped to zero.
    pub inventory: u32,
    #[serde(default)]
    pub images: Vec<String>,
    pub status: ProductStatus,
    pub platform: PlatformType,
    pub platform_product_id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<ProductVariant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub price: Decimal,
    pub inventory: u32,
}

/// Partial product update pushed back to a platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

/// A normalized order.
///
/// `status` keeps the platform's own vocabulary; it is not re-mapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_email: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: String,
    pub order_date: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    pub platform: PlatformType,
    pub platform_order_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    /// Some platforms report fractional quantities (weight-based goods).
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
}

/// Postal address attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    /// True when the platform sent an address object with nothing in it.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.first_name.is_empty()
            && self.last_name.is_empty()
            && self.address1.is_empty()
            && self.city.is_empty()
            && self.postcode.is_empty()
            && self.country.is_empty()
    }
}

/// A normalized customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub platform: PlatformType,
    pub platform_customer_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_address() {
        assert!(Address::default().is_blank());

        let address = Address {
            city: "Portland".to_string(),
            ..Address::default()
        };
        assert!(!address.is_blank());
    }

    #[test]
    fn test_product_price_serializes_as_string() {
        let product = Product {
            id: "5".to_string(),
            name: "Mug".to_string(),
            description: None,
            price: Decimal::new(999, 2),
            sku: None,
            inventory: 3,
            images: vec!["a.jpg".to_string()],
            status: ProductStatus::Active,
            platform: PlatformType::WooCommerce,
            platform_product_id: "5".to_string(),
            metadata: Metadata::new(),
            variants: Vec::new(),
            categories: Vec::new(),
            tags: Vec::new(),
        };

        let json = serde_json::to_value(&product).expect("serialize");
        assert_eq!(json["price"], "9.99");
        // Empty optional collections are omitted.
        assert!(json.get("variants").is_none());
    }
}
