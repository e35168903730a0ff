use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque user identifier.
///
/// The server hands out integer ids, but nothing on the client depends on
/// that, so both JSON numbers and strings are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Self::from(n),
            Raw::Text(s) => Self(s),
        })
    }
}

/// Where a timeline entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    History,
    Live,
}

/// A decrypted chat message as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub sender_id: UserId,
    /// Plaintext, or a placeholder when a live frame failed to decrypt.
    pub text: String,
    /// Display-formatted server time.
    pub timestamp: String,
    /// Server instant, when the server sent one we could parse.
    pub sent_at: Option<DateTime<Utc>>,
    pub origin: Origin,
    pub is_own: bool,
}

/// Connection state of the active room, as reported to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Errored,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Errored => "errored",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_from_number_and_string_compare_equal() {
        let a: UserId = serde_json::from_str("42").unwrap();
        let b: UserId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "42");
    }

    #[test]
    fn user_id_rejects_other_json_types() {
        assert!(serde_json::from_str::<UserId>("true").is_err());
        assert!(serde_json::from_str::<UserId>("null").is_err());
    }

    #[test]
    fn default_status_is_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert!(ConnectionStatus::Connected.is_connected());
    }
}
