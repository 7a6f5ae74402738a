//! Credential encryption.
//!
//! Platform credentials are encrypted before they reach the database and only
//! decrypted in memory for the duration of a sync or connection test.
//!
//! - [`AeadCipher`] - ChaCha20-Poly1305 with an Argon2id-derived key (production)
//! - [`EncodingCipher`] - reversible base64 encoding (development and tests only)
//!
//! [`CredentialCipher`] selects between the two at startup.

mod aead;
mod encoding;

pub use aead::AeadCipher;
pub use encoding::EncodingCipher;

use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{EncryptionConfig, EncryptionMode};

/// Errors from encrypting or decrypting credential blobs.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation parameters were rejected.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// No key was configured for the strong cipher.
    #[error("Encryption key is not configured")]
    MissingKey,

    /// Value could not be serialized to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input was not valid base64.
    #[error("Invalid encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Input decoded but is structurally invalid (e.g. too short for a nonce).
    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    /// AEAD encryption failed.
    #[error("Encryption failed")]
    Encrypt,

    /// Authentication failed: wrong key or tampered data.
    #[error("Decryption failed: wrong key or corrupted data")]
    Decrypt,
}

/// The cipher used for credential blobs.
#[derive(Debug, Clone)]
pub enum CredentialCipher {
    Aead(AeadCipher),
    Encoding(EncodingCipher),
}

impl CredentialCipher {
    /// Build the cipher selected by configuration.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MissingKey` in strong mode without a key, or
    /// `CryptoError::KeyDerivation` if the key cannot be derived.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, CryptoError> {
        match config.mode {
            EncryptionMode::Strong => {
                let secret = config.key.as_ref().ok_or(CryptoError::MissingKey)?;
                Ok(Self::Aead(AeadCipher::new(secret)?))
            }
            EncryptionMode::Simple => {
                tracing::warn!(
                    "Credential encryption is in simple mode (base64 only); do not use in production"
                );
                Ok(Self::Encoding(EncodingCipher))
            }
        }
    }

    /// Strong cipher from a raw secret.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` if the key cannot be derived.
    pub fn strong(secret: &SecretString) -> Result<Self, CryptoError> {
        Ok(Self::Aead(AeadCipher::new(secret)?))
    }

    /// The base64 fallback.
    #[must_use]
    pub const fn simple() -> Self {
        Self::Encoding(EncodingCipher)
    }

    /// Serialize `value` to JSON and encrypt it.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if serialization or encryption fails.
    pub fn encrypt<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CryptoError> {
        let plaintext = serde_json::to_vec(value)?;
        match self {
            Self::Aead(cipher) => cipher.encrypt_bytes(&plaintext),
            Self::Encoding(cipher) => Ok(cipher.encode_bytes(&plaintext)),
        }
    }

    /// Decrypt a blob produced by [`Self::encrypt`] and deserialize it.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if the blob is malformed, the key is wrong, or the
    /// plaintext is not the expected JSON shape. There is no partial recovery.
    pub fn decrypt<T: DeserializeOwned>(&self, encrypted: &str) -> Result<T, CryptoError> {
        let plaintext = match self {
            Self::Aead(cipher) => cipher.decrypt_bytes(encrypted)?,
            Self::Encoding(cipher) => cipher.decode_bytes(encrypted)?,
        };
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Health check: true when `encrypted` decrypts to valid JSON.
    #[must_use]
    pub fn validate_encrypted_data(&self, encrypted: &str) -> bool {
        match self.decrypt::<serde_json::Value>(encrypted) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Encrypted credential validation failed");
                false
            }
        }
    }

    /// Whether this is the development-only fallback.
    #[must_use]
    pub const fn is_simple(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strong() -> CredentialCipher {
        CredentialCipher::strong(&SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6")).unwrap()
    }

    #[test]
    fn test_roundtrip_both_ciphers() {
        let value = json!({"shop": "foo.myshopify.com", "accessToken": "shpat_x", "n": [1, 2.5, null]});
        for cipher in [strong(), CredentialCipher::simple()] {
            let encrypted = cipher.encrypt(&value).unwrap();
            let decrypted: serde_json::Value = cipher.decrypt(&encrypted).unwrap();
            assert_eq!(decrypted, value);
        }
    }

    #[test]
    fn test_strong_ciphertext_hides_plaintext() {
        let encrypted = strong().encrypt(&json!({"token": "shpat_secret"})).unwrap();
        assert!(!encrypted.contains("shpat_secret"));
        // The simple cipher is only an encoding; decoding reveals the token.
        let encoded = CredentialCipher::simple()
            .encrypt(&json!({"token": "shpat_secret"}))
            .unwrap();
        let decoded: serde_json::Value = CredentialCipher::simple().decrypt(&encoded).unwrap();
        assert_eq!(decoded["token"], "shpat_secret");
    }

    #[test]
    fn test_validate_encrypted_data() {
        let cipher = strong();
        let encrypted = cipher.encrypt(&json!({"a": 1})).unwrap();
        assert!(cipher.validate_encrypted_data(&encrypted));
        assert!(!cipher.validate_encrypted_data("not base64 at all!"));
        assert!(!CredentialCipher::simple().validate_encrypted_data(&encrypted));
    }

    #[test]
    fn test_from_config_requires_key_in_strong_mode() {
        let config = EncryptionConfig {
            mode: EncryptionMode::Strong,
            key: None,
        };
        assert!(matches!(
            CredentialCipher::from_config(&config),
            Err(CryptoError::MissingKey)
        ));
    }

    #[test]
    fn test_from_config_simple() {
        let config = EncryptionConfig {
            mode: EncryptionMode::Simple,
            key: None,
        };
        assert!(CredentialCipher::from_config(&config).unwrap().is_simple());
    }
}
