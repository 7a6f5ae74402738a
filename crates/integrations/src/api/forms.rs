//! Connect-form field descriptors.

use serde::{Deserialize, Serialize};
use socialspark_core::{FieldType, PlatformConfig};

/// One input on a platform's connect form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    /// Masked input; never echoed back.
    pub secure: bool,
    pub placeholder: String,
}

/// Form fields for `config`, in field-name order.
#[must_use]
pub fn form_fields(config: &PlatformConfig) -> Vec<FormField> {
    config
        .api_fields
        .iter()
        .map(|(name, field_type)| {
            let label = label_for(name);
            FormField {
                placeholder: placeholder_for(name, &label),
                name: name.clone(),
                label,
                field_type: *field_type,
                required: true,
                secure: *field_type == FieldType::Password,
            }
        })
        .collect()
}

/// `accessToken` / `site_url` → `Access Token` / `Site URL`.
fn label_for(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in name.chars() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| match word.to_ascii_lowercase().as_str() {
            "url" | "api" | "id" => word.to_ascii_uppercase(),
            _ => {
                let mut chars = word.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn placeholder_for(name: &str, label: &str) -> String {
    match name {
        "shop" => "your-store.myshopify.com".to_string(),
        "site_url" => "https://your-store.com".to_string(),
        "base_url" => "https://api.your-store.com".to_string(),
        "accessToken" => "shpat_...".to_string(),
        "consumer_key" => "ck_...".to_string(),
        "consumer_secret" => "cs_...".to_string(),
        _ => format!("Enter your {}", label.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use socialspark_core::{PlatformType, builtin_platform_configs};

    use super::*;

    fn config(platform: PlatformType) -> PlatformConfig {
        builtin_platform_configs()
            .into_iter()
            .find(|c| c.platform == platform)
            .expect("builtin config")
    }

    #[test]
    fn test_labels() {
        assert_eq!(label_for("accessToken"), "Access Token");
        assert_eq!(label_for("site_url"), "Site URL");
        assert_eq!(label_for("api_key"), "API Key");
        assert_eq!(label_for("shop"), "Shop");
    }

    #[test]
    fn test_woocommerce_form() {
        let fields = form_fields(&config(PlatformType::WooCommerce));
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["consumer_key", "consumer_secret", "site_url"]);

        let secret = fields.iter().find(|f| f.name == "consumer_secret").expect("field");
        assert!(secret.secure);
        assert!(secret.required);
        assert_eq!(secret.placeholder, "cs_...");

        let site = fields.iter().find(|f| f.name == "site_url").expect("field");
        assert!(!site.secure);
        assert_eq!(site.field_type, FieldType::Url);
    }

    #[test]
    fn test_generic_placeholder() {
        let fields = form_fields(&config(PlatformType::Magento));
        let token = fields.iter().find(|f| f.name == "access_token").expect("field");
        assert_eq!(token.placeholder, "Enter your access token");
    }

    #[test]
    fn test_field_type_serializes_as_type() {
        let fields = form_fields(&config(PlatformType::Custom));
        let json = serde_json::to_value(&fields).expect("serialize");
        assert_eq!(json[0]["type"], "password");
        assert_eq!(json[0]["name"], "api_key");
    }
}
