use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("encryption key is empty")]
    EmptyKey,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("invalid key encoding: {0}")]
    InvalidKey(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// Authentication tag mismatch: wrong key or tampered ciphertext.
    #[error("decryption failed")]
    Decrypt,

    #[error("decrypted message is not valid UTF-8")]
    InvalidUtf8,
}
