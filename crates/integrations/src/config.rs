//! Integration service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `API_BASE_URL` - Public URL of this service (webhook callbacks are built from it)
//! - `CREDENTIALS_ENCRYPTION_KEY` - Secret the credential key is derived from
//!   (min 32 chars, high entropy). Optional only when `ENCRYPTION_MODE=simple`.
//!
//! ## Optional
//! - `INTEGRATIONS_HOST` - Bind address (default: 127.0.0.1)
//! - `INTEGRATIONS_PORT` - Listen port (default: 3002)
//! - `ENCRYPTION_MODE` - `strong` (default) or `simple` (base64, dev/test only)
//! - `INITIAL_SYNC_DELAY_SECS` - Delay before the post-connect sync (default: 5)
//! - `INITIAL_SYNC_MAX_ATTEMPTS` - Attempts for the post-connect sync (default: 3)
//! - `INITIAL_SYNC_BACKOFF_SECS` - Base backoff between attempts (default: 30)
//! - `BULK_SYNC_CONCURRENCY` - Parallel syncs in a bulk sync (default: 4)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENCRYPTION_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which credential cipher the service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    /// Argon2-derived key with ChaCha20-Poly1305.
    #[default]
    Strong,
    /// Reversible base64 encoding. Never use outside development and tests.
    Simple,
}

impl std::str::FromStr for EncryptionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strong" => Ok(Self::Strong),
            "simple" => Ok(Self::Simple),
            other => Err(format!("expected 'strong' or 'simple', got '{other}'")),
        }
    }
}

/// Credential encryption settings.
///
/// Implements `Debug` manually to redact the key material.
#[derive(Clone)]
pub struct EncryptionConfig {
    pub mode: EncryptionMode,
    /// Secret the AEAD key is derived from. `None` only in simple mode.
    pub key: Option<SecretString>,
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("mode", &self.mode)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl EncryptionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mode = get_env_or_default("ENCRYPTION_MODE", "strong")
            .parse::<EncryptionMode>()
            .map_err(|e| ConfigError::InvalidEnvVar("ENCRYPTION_MODE".to_string(), e))?;

        let key = match mode {
            EncryptionMode::Strong => {
                let key = get_validated_secret("CREDENTIALS_ENCRYPTION_KEY")?;
                validate_key_length(&key, "CREDENTIALS_ENCRYPTION_KEY")?;
                Some(key)
            }
            EncryptionMode::Simple => {
                get_optional_env("CREDENTIALS_ENCRYPTION_KEY").map(SecretString::from)
            }
        };

        Ok(Self { mode, key })
    }
}

/// Background initial-sync settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWorkerConfig {
    /// Delay between `connect_store` returning and the first sync attempt.
    pub initial_delay: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles for each later one.
    pub base_backoff: Duration,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_attempts: 3,
            base_backoff: Duration::from_secs(30),
        }
    }
}

impl SyncWorkerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            initial_delay: Duration::from_secs(parse_env("INITIAL_SYNC_DELAY_SECS", 5)?),
            max_attempts: parse_env("INITIAL_SYNC_MAX_ATTEMPTS", 3)?,
            base_backoff: Duration::from_secs(parse_env("INITIAL_SYNC_BACKOFF_SECS", 30)?),
        })
    }
}

/// Integration service configuration.
#[derive(Debug, Clone)]
pub struct IntegrationsConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this service
    pub api_base_url: String,
    pub encryption: EncryptionConfig,
    pub sync_worker: SyncWorkerConfig,
    /// Maximum connections synced in parallel by a bulk sync
    pub bulk_sync_concurrency: usize,
    /// Emit JSON logs instead of text
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
}

impl IntegrationsConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let host = get_env_or_default("INTEGRATIONS_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("INTEGRATIONS_HOST".to_string(), e.to_string())
            })?;
        let port = parse_env("INTEGRATIONS_PORT", 3002)?;
        let api_base_url = get_required_env("API_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&api_base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("API_BASE_URL".to_string(), e.to_string()))?;

        let encryption = EncryptionConfig::from_env()?;
        let sync_worker = SyncWorkerConfig::from_env()?;
        let bulk_sync_concurrency = parse_env::<usize>("BULK_SYNC_CONCURRENCY", 4)?.max(1);
        let json_logs =
            get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            api_base_url,
            encryption,
            sync_worker,
            bulk_sync_concurrency,
            json_logs,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Validate that an encryption secret meets minimum length requirements.
fn validate_key_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_ENCRYPTION_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_ENCRYPTION_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
