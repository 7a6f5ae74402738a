//! ChaCha20-Poly1305 credential cipher.
//!
//! Output layout: `base64(nonce || ciphertext_with_tag)`. The 256-bit key is
//! derived once per process from the configured secret with Argon2id using a
//! fixed salt and cost, so every instance of a deployment derives the same key.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, KeyInit};
use secrecy::{ExposeSecret, SecretString};

use super::CryptoError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
/// Deployment-wide salt; the secret itself provides the per-deployment entropy.
const KDF_SALT: &[u8] = b"socialspark.store-credentials.v1";
const KDF_MEMORY_KIB: u32 = 19_456;
const KDF_ITERATIONS: u32 = 2;
const KDF_PARALLELISM: u32 = 1;

/// AEAD cipher for credential blobs.
#[derive(Clone)]
pub struct AeadCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl AeadCipher {
    /// Derive the key from `secret` and build the cipher.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` if Argon2 rejects the parameters.
    pub fn new(secret: &SecretString) -> Result<Self, CryptoError> {
        let params = Params::new(KDF_MEMORY_KIB, KDF_ITERATIONS, KDF_PARALLELISM, Some(KEY_LEN))
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let kdf = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; KEY_LEN];
        kdf.hash_password_into(secret.expose_secret().as_bytes(), KDF_SALT, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let cipher = ChaCha20Poly1305::new(&key.into());
        key.fill(0);
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub(super) fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let nonce: [u8; NONCE_LEN] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(&nonce.into(), plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    /// Reverse [`Self::encrypt_bytes`].
    pub(super) fn decrypt_bytes(&self, encrypted: &str) -> Result<Vec<u8>, CryptoError> {
        let blob = STANDARD.decode(encrypted.trim())?;
        if blob.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed(format!(
                "expected more than {NONCE_LEN} bytes, got {}",
                blob.len()
            )));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| CryptoError::Malformed("invalid nonce".to_string()))?;

        self.cipher
            .decrypt(&nonce.into(), ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cipher(secret: &str) -> AeadCipher {
        AeadCipher::new(&SecretString::from(secret.to_string())).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let c = cipher("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let encrypted = c.encrypt_bytes(b"{\"k\":\"v\"}").unwrap();
        assert_eq!(c.decrypt_bytes(&encrypted).unwrap(), b"{\"k\":\"v\"}");
    }

    #[test]
    fn test_nonce_is_random_per_call() {
        let c = cipher("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let first = c.encrypt_bytes(b"same").unwrap();
        let second = c.encrypt_bytes(b"same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let a = cipher("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let b = cipher("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let encrypted = a.encrypt_bytes(b"shared").unwrap();
        assert_eq!(b.decrypt_bytes(&encrypted).unwrap(), b"shared");
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = cipher("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6")
            .encrypt_bytes(b"secret")
            .unwrap();
        let result = cipher("zZ9#qQ1!wW5@eE7$rR3%tT8^yY2&uU4").decrypt_bytes(&encrypted);
        assert!(matches!(result, Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let c = cipher("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let encrypted = c.encrypt_bytes(b"secret").unwrap();
        let mut blob = STANDARD.decode(&encrypted).unwrap();
        if let Some(last) = blob.last_mut() {
            *last ^= 0x01;
        }
        let tampered = STANDARD.encode(blob);
        assert!(matches!(c.decrypt_bytes(&tampered), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_short_input_is_malformed() {
        let c = cipher("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let short = STANDARD.encode([0u8; NONCE_LEN]);
        assert!(matches!(c.decrypt_bytes(&short), Err(CryptoError::Malformed(_))));
    }

    #[test]
    fn test_invalid_base64() {
        let c = cipher("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        assert!(matches!(c.decrypt_bytes("%%%"), Err(CryptoError::Encoding(_))));
    }
}
