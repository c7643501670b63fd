//! Encrypted value handling.
//!
//! # Data Flow
//! ```text
//! stored value "{cipher}<payload>"
//!     → CipherGateway::decrypt_if_encrypted (marker check)
//!     → Cipher::decrypt(<payload>)
//!     → plaintext
//! ```
//!
//! # Design Decisions
//! - The marker convention lives here; the primitive behind it is pluggable
//! - Unmarked values pass through untouched
//! - Without a key, marked values fail to decrypt instead of leaking ciphertext

pub mod aes;

use std::sync::Arc;

use thiserror::Error;

use crate::config::environment::Environment;

pub use aes::AesGcmCipher;

/// Prefix identifying an encrypted stored value.
pub const CIPHER_PREFIX: &str = "{cipher}";

/// Environment property holding the base64 encoded cipher key.
pub const CIPHER_KEY_PROPERTY: &str = "config.cipher.key";

/// Errors raised by the encryption gateway.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("No cipher key configured (set {CIPHER_KEY_PROPERTY})")]
    NoKey,

    #[error("Invalid cipher key: {0}")]
    InvalidKey(String),

    #[error("Encrypted value is malformed")]
    InvalidFormat,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,
}

/// A reversible cipher primitive.
///
/// Implementations work on the payload only; the `{cipher}` marker is handled by
/// [`CipherGateway`].
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;
    fn decrypt(&self, payload: &str) -> Result<String, CryptoError>;
}

/// Applies the `{cipher}` marker convention on top of a [`Cipher`].
#[derive(Clone, Default)]
pub struct CipherGateway {
    cipher: Option<Arc<dyn Cipher>>,
}

impl CipherGateway {
    pub fn new(cipher: impl Cipher + 'static) -> Self {
        Self {
            cipher: Some(Arc::new(cipher)),
        }
    }

    /// A gateway with no key. Unmarked values still pass through.
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    /// Build from the `config.cipher.key` environment property, if present.
    pub fn from_environment(env: &Environment) -> Result<Self, CryptoError> {
        match env.get(CIPHER_KEY_PROPERTY) {
            Some(key) if !key.trim().is_empty() => {
                Ok(Self::new(AesGcmCipher::from_base64(key.trim())?))
            }
            _ => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// True if the text carries the cipher marker.
    pub fn is_encrypted(text: &str) -> bool {
        text.starts_with(CIPHER_PREFIX)
    }

    /// Encrypt and prepend the marker.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = self.cipher.as_ref().ok_or(CryptoError::NoKey)?;
        Ok(format!("{}{}", CIPHER_PREFIX, cipher.encrypt(plaintext)?))
    }

    /// Decrypt a value. The marker is stripped if present.
    pub fn decrypt(&self, text: &str) -> Result<String, CryptoError> {
        let cipher = self.cipher.as_ref().ok_or(CryptoError::NoKey)?;
        let payload = text.strip_prefix(CIPHER_PREFIX).unwrap_or(text);
        cipher.decrypt(payload)
    }

    /// Decrypt only when the marker is present; otherwise return the text as is.
    pub fn decrypt_if_encrypted(&self, text: &str) -> Result<String, CryptoError> {
        if Self::is_encrypted(text) {
            self.decrypt(text)
        } else {
            Ok(text.to_string())
        }
    }
}

impl std::fmt::Debug for CipherGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherGateway")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> CipherGateway {
        CipherGateway::new(AesGcmCipher::new(AesGcmCipher::generate_key()))
    }

    #[test]
    fn test_round_trip() {
        let gateway = gateway();
        for text in ["Test", "123@DefaultPassword", "ünïcødé ✓", "a"] {
            let encrypted = gateway.encrypt(text).unwrap();
            assert!(encrypted.starts_with(CIPHER_PREFIX));
            assert_eq!(gateway.decrypt_if_encrypted(&encrypted).unwrap(), text);
            assert_eq!(gateway.decrypt(&encrypted).unwrap(), text);
        }
    }

    #[test]
    fn test_unmarked_passthrough() {
        let gateway = gateway();
        assert_eq!(gateway.decrypt_if_encrypted("plain").unwrap(), "plain");
        assert_eq!(gateway.decrypt_if_encrypted("").unwrap(), "");
        assert_eq!(gateway.decrypt_if_encrypted("x{cipher}y").unwrap(), "x{cipher}y");

        // No key needed for values that are not encrypted.
        let disabled = CipherGateway::disabled();
        assert_eq!(disabled.decrypt_if_encrypted("plain").unwrap(), "plain");
    }

    #[test]
    fn test_disabled_gateway_rejects_marked_values() {
        let disabled = CipherGateway::disabled();
        assert!(matches!(
            disabled.decrypt_if_encrypted("{cipher}abc"),
            Err(CryptoError::NoKey)
        ));
        assert!(matches!(disabled.encrypt("x"), Err(CryptoError::NoKey)));
    }

    #[test]
    fn test_from_environment() {
        let key = AesGcmCipher::encode_key(&AesGcmCipher::generate_key());
        let env = Environment::empty().with_property(CIPHER_KEY_PROPERTY, key);
        assert!(CipherGateway::from_environment(&env).unwrap().is_enabled());
        assert!(!CipherGateway::from_environment(&Environment::empty())
            .unwrap()
            .is_enabled());

        let bad = Environment::empty().with_property(CIPHER_KEY_PROPERTY, "short");
        assert!(CipherGateway::from_environment(&bad).is_err());
    }
}
