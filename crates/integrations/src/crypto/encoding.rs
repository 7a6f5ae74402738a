//! Base64 "cipher" for development and tests.
//!
//! Provides no confidentiality. Production deployments use
//! [`super::AeadCipher`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::CryptoError;

/// Reversible base64 encoding of credential JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingCipher;

impl EncodingCipher {
    pub(super) fn encode_bytes(self, plaintext: &[u8]) -> String {
        STANDARD.encode(plaintext)
    }

    pub(super) fn decode_bytes(self, encoded: &str) -> Result<Vec<u8>, CryptoError> {
        Ok(STANDARD.decode(encoded.trim())?)
    }
}
