//! Murmur message crypto.
//!
//! Shared symmetric key encryption (AES-256-GCM). Everyone in a deployment
//! holds the same pre-shared secret; each message gets a fresh salt and
//! nonce, and its key is derived from the secret with HKDF-SHA256.
//!
//! The secret sits behind [`KeyMaterial`] so a real key exchange can replace
//! [`PreSharedKey`] without changing how [`Cipher`] is called.

pub mod encrypt;
pub mod error;
pub mod keys;

pub use encrypt::Cipher;
pub use error::CryptoError;
pub use keys::{KeyMaterial, PreSharedKey};
