use murmur_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL ({value}): {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} cannot be used as a base URL")]
    NotABase(String),

    #[error("MURMUR_SHARED_SECRET is not valid base64: {0}")]
    InvalidSecret(#[source] CryptoError),
}

/// The whole history fetch failed. The room still opens, just without history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("history endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed history response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Endpoint(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures reported to the caller of the session engine.
///
/// `Display` is the user-facing banner text.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot send empty message")]
    EmptyMessage,

    #[error("Not connected. Please wait...")]
    NotConnected,

    #[error("Room name cannot be empty")]
    InvalidRoom,

    #[error("Failed to encrypt message: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Failed to send message: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid server address: {0}")]
    Endpoint(#[from] ConfigError),
}

impl From<ChannelError> for SessionError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::NotConnected => Self::NotConnected,
            ChannelError::Transport(e) => Self::Transport(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server rejected request (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error(transparent)]
    Endpoint(#[from] ConfigError),
}
