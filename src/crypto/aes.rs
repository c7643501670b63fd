//! AES-256-GCM cipher.
//!
//! Payload format: `base64(nonce || ciphertext || tag)` with a random 96-bit nonce.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::{Cipher, CryptoError};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    /// Create from a base64 encoded 32-byte key.
    pub fn from_base64(key_b64: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(key_b64)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CryptoError::InvalidKey(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::new(key))
    }

    pub fn generate_key() -> [u8; 32] {
        rand::random()
    }

    pub fn encode_key(key: &[u8; 32]) -> String {
        BASE64.encode(key)
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    fn decrypt(&self, payload: &str) -> Result<String, CryptoError> {
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|_| CryptoError::InvalidFormat)?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::InvalidFormat);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}
