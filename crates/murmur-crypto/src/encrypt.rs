use std::sync::Arc;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::keys::KeyMaterial;

const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// Sealed message as it travels inside the base64 token.
#[derive(Serialize, Deserialize)]
struct SealedMessage {
    nonce: String,
    ct: String,
    salt: String,
}

/// Encrypts and decrypts message bodies with a held key.
///
/// Tokens are `base64(json({"nonce", "ct", "salt"}))` with each field itself
/// base64. Cloning is cheap and shares the key.
#[derive(Clone)]
pub struct Cipher {
    key: Arc<dyn KeyMaterial>,
}

impl Cipher {
    pub fn new(key: impl KeyMaterial + 'static) -> Self {
        Self { key: Arc::new(key) }
    }

    /// Encrypt a plaintext message into a printable token.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let key = self.key.message_key(&salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let sealed = SealedMessage {
            nonce: BASE64.encode(nonce_bytes),
            ct: BASE64.encode(ciphertext),
            salt: BASE64.encode(salt),
        };
        let json = serde_json::to_vec(&sealed).map_err(|_| CryptoError::Encrypt)?;
        Ok(BASE64.encode(json))
    }

    /// Decrypt a token produced by [`Cipher::encrypt`].
    pub fn decrypt(&self, token: &str) -> Result<String, CryptoError> {
        let json = BASE64
            .decode(token.trim())
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let sealed: SealedMessage =
            serde_json::from_slice(&json).map_err(|e| CryptoError::Malformed(e.to_string()))?;

        let nonce_bytes = decode_field(&sealed.nonce, "nonce")?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::Malformed(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                nonce_bytes.len()
            )));
        }
        let ciphertext = decode_field(&sealed.ct, "ct")?;
        let salt = decode_field(&sealed.salt, "salt")?;

        let key = self.key.message_key(&salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

fn decode_field(value: &str, name: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(value)
        .map_err(|e| CryptoError::Malformed(format!("{}: {}", name, e)))
}
