//! Lenient field decoding for platform payloads.
//!
//! Storefront APIs disagree with themselves across versions and plans: prices
//! arrive as strings or numbers, ids as integers or strings, and optional
//! fields as `null`, `""` or absent. These helpers accept all of those and
//! fall back to zero or empty instead of failing the whole page.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use socialspark_core::Metadata;

/// Decimal from a JSON number or numeric string. Anything else is zero.
#[must_use]
pub(crate) fn to_decimal(value: &Value) -> Decimal {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Decimal::ZERO,
    };
    if text.is_empty() {
        return Decimal::ZERO;
    }
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .unwrap_or(Decimal::ZERO)
}

/// Non-negative stock count. Negative stock (backorders) clamps to zero.
#[must_use]
pub(crate) fn to_stock(value: &Value) -> u32 {
    let count = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                #[allow(clippy::cast_possible_truncation)]
                n.as_f64().map(|f| f.floor() as i64)
            })
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

/// Id as a string, whether the platform sent a number or a string.
#[must_use]
pub(crate) fn to_id(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

/// `None` for null, missing or blank strings.
#[must_use]
pub(crate) fn to_opt_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Timestamp from RFC 3339 or the zone-less `YYYY-MM-DD[ T]HH:MM:SS` forms
/// WooCommerce and Magento use (interpreted as UTC).
///
/// Unparseable or missing timestamps become the Unix epoch so mapping stays
/// deterministic.
#[must_use]
pub(crate) fn to_datetime(value: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return DateTime::<Utc>::UNIX_EPOCH;
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |naive| naive.and_utc())
}

/// Split a comma-separated tag string, dropping blanks.
#[must_use]
pub(crate) fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Metadata map from key/value pairs, dropping nulls.
pub(crate) fn metadata<const N: usize>(entries: [(&str, Value); N]) -> Metadata {
    entries
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

pub(crate) fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    Ok(to_decimal(&Value::deserialize(deserializer)?))
}

pub(crate) fn stock<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(to_stock(&Value::deserialize(deserializer)?))
}

pub(crate) fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(to_id(&Value::deserialize(deserializer)?))
}

pub(crate) fn opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(to_opt_string(&Value::deserialize(deserializer)?))
}

/// String that tolerates `null`.
pub(crate) fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(to_opt_string(&Value::deserialize(deserializer)?).unwrap_or_default())
}
