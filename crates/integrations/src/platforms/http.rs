//! Shared HTTP plumbing for adapters.
//!
//! Adapters own no connection state; they borrow one pooled `reqwest::Client`
//! and pass per-call auth derived from the connection's credentials.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::AdapterError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("socialspark-integrations/", env!("CARGO_PKG_VERSION"));
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;
/// Error bodies longer than this are truncated in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Per-request authentication scheme.
#[derive(Clone, Copy)]
pub(crate) enum Auth<'a> {
    /// Custom header, e.g. `X-Shopify-Access-Token`.
    Header { name: &'static str, value: &'a str },
    /// HTTP Basic.
    Basic { username: &'a str, password: &'a str },
    /// `Authorization: Bearer <token>`.
    Bearer(&'a str),
}

/// Pooled HTTP client shared by every adapter instance.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
}

impl ApiClient {
    /// Build a client with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new() -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn request(&self, method: Method, url: Url, auth: Auth<'_>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match auth {
            Auth::Header { name, value } => builder.header(name, value),
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Auth::Bearer(token) => builder.bearer_auth(token),
        }
    }

    /// GET `url` and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        auth: Auth<'_>,
    ) -> Result<T, AdapterError> {
        let response = self.request(Method::GET, url, auth).send().await?;
        handle_response(response).await
    }

    /// GET `url` and report only whether the response was 2xx.
    pub(crate) async fn probe(&self, url: Url, auth: Auth<'_>) -> bool {
        match self.request(Method::GET, url.clone(), auth).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    tracing::debug!(
                        url = %url,
                        status = %response.status(),
                        "Credential probe rejected"
                    );
                }
                ok
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Credential probe failed");
                false
            }
        }
    }
}

/// Decode a success body or map the failure to an [`AdapterError`].
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, AdapterError> {
    if response.status().is_success() {
        return response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(format!("Failed to parse response: {e}")));
    }
    Err(parse_error(response).await)
}

async fn parse_error(response: Response) -> AdapterError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map_or(DEFAULT_RETRY_AFTER_SECS, |secs| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let secs = secs.ceil().max(0.0) as u64;
                secs
            });
        return AdapterError::RateLimited(retry_after);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdapterError::Unauthorized(message),
        StatusCode::NOT_FOUND => AdapterError::NotFound(message),
        _ => AdapterError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull a human-readable message out of an error body.
///
/// Shopify uses `errors`, WooCommerce and Magento use `message`.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "errors", "error"] {
            match json.get(key) {
                Some(serde_json::Value::String(s)) => return Some(s.clone()),
                Some(other) if !other.is_null() => return Some(other.to_string()),
                _ => {}
            }
        }
    }
    Some(body.chars().take(MAX_ERROR_BODY).collect())
}

/// Normalize a user-supplied shop/site/base value into a base URL.
///
/// Values with an explicit `http://` or `https://` scheme are kept; anything
/// else is assumed to be a bare host and gets `https://`. `suffix` is the API
/// root appended to the host, e.g. `/wp-json/wc/v3`.
pub(crate) fn base_url(raw: &str, suffix: &str) -> Result<String, AdapterError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AdapterError::InvalidUrl("empty store URL".to_string()));
    }
    let lower = trimmed.to_ascii_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let base = format!("{with_scheme}{suffix}");
    Url::parse(&base).map_err(|e| AdapterError::InvalidUrl(format!("{raw}: {e}")))?;
    Ok(base)
}

/// Join `path` onto `base` and append query pairs.
pub(crate) fn endpoint(
    base: &str,
    path: &str,
    query: &[(&str, String)],
) -> Result<Url, AdapterError> {
    let mut url = Url::parse(&format!("{base}{path}"))
        .map_err(|e| AdapterError::InvalidUrl(format!("{base}{path}: {e}")))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_assumes_https() {
        assert_eq!(
            base_url("foo.myshopify.com", "/admin/api/2024-01").unwrap(),
            "https://foo.myshopify.com/admin/api/2024-01"
        );
    }

    #[test]
    fn test_base_url_keeps_explicit_scheme() {
        assert_eq!(
            base_url("http://127.0.0.1:8080/", "/wp-json/wc/v3").unwrap(),
            "http://127.0.0.1:8080/wp-json/wc/v3"
        );
        assert_eq!(
            base_url("HTTPS://Shop.Example", "").unwrap(),
            "HTTPS://Shop.Example"
        );
    }

    #[test]
    fn test_base_url_rejects_empty() {
        assert!(matches!(base_url("  ", "/x"), Err(AdapterError::InvalidUrl(_))));
    }

    #[test]
    fn test_endpoint_with_query() {
        let url = endpoint(
            "https://m.example/rest/V1",
            "/products",
            &[("searchCriteria[pageSize]", "10".to_string())],
        )
        .unwrap();
        assert_eq!(url.path(), "/rest/V1/products");
        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "searchCriteria[pageSize]");
        assert_eq!(pairs[0].1, "10");
    }

    #[test]
    fn test_endpoint_without_query_has_no_question_mark() {
        let url = endpoint("https://s.example/admin/api/2024-01", "/shop.json", &[]).unwrap();
        assert_eq!(url.as_str(), "https://s.example/admin/api/2024-01/shop.json");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"errors":"[API] Invalid API key"}"#).as_deref(),
            Some("[API] Invalid API key")
        );
        assert_eq!(
            error_message(r#"{"code":"woocommerce_rest_cannot_view","message":"Sorry"}"#).as_deref(),
            Some("Sorry")
        );
        assert_eq!(error_message("  ").as_deref(), None);
        assert_eq!(error_message("Bad Gateway").as_deref(), Some("Bad Gateway"));
    }
}
