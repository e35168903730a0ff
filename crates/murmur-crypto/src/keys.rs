use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

const MESSAGE_KEY_INFO: &[u8] = b"murmur message key v1";

/// Source of per-message AES-256 keys.
pub trait KeyMaterial: Send + Sync {
    /// Derive the key for a message sealed with `salt`.
    fn message_key(&self, salt: &[u8]) -> Result<[u8; 32], CryptoError>;
}

/// A secret shared out-of-band by every participant.
#[derive(Clone)]
pub struct PreSharedKey {
    secret: Vec<u8>,
}

impl PreSharedKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn from_passphrase(passphrase: &str) -> Self {
        Self::new(passphrase.as_bytes())
    }

    /// Secret given as base64 rather than as a passphrase.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let secret = BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::new(secret))
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for PreSharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreSharedKey")
            .field("len", &self.secret.len())
            .finish_non_exhaustive()
    }
}

impl KeyMaterial for PreSharedKey {
    fn message_key(&self, salt: &[u8]) -> Result<[u8; 32], CryptoError> {
        if self.secret.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        let hk = Hkdf::<Sha256>::new(Some(salt), &self.secret);
        let mut key = [0u8; 32];
        hk.expand(MESSAGE_KEY_INFO, &mut key)
            .map_err(|_| CryptoError::KeyDerivation)?;
        Ok(key)
    }
}
