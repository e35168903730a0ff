use murmur_crypto::{Cipher, PreSharedKey};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8020";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8020";
pub const DEFAULT_SHARED_SECRET: &str = "change-me";
pub const DEFAULT_ROOM: &str = "general";

/// Prefix marking a shared secret given as base64 bytes.
const BASE64_SECRET_PREFIX: &str = "base64:";

/// Shared secrets that only exist for local development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "change-me-to-a-random-string"];

/// Client connection settings.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_base: Url,
    pub ws_base: Url,
    pub shared_key: PreSharedKey,
    pub default_room: String,
}

impl ClientConfig {
    /// Read `MURMUR_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = parse_base(
            "MURMUR_API_URL",
            lookup("MURMUR_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            &["http", "https"],
        )?;
        let ws_base = parse_base(
            "MURMUR_WS_URL",
            lookup("MURMUR_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.into()),
            &["ws", "wss"],
        )?;
        let shared_secret =
            lookup("MURMUR_SHARED_SECRET").unwrap_or_else(|| DEFAULT_SHARED_SECRET.into());
        let shared_key = match shared_secret.strip_prefix(BASE64_SECRET_PREFIX) {
            Some(encoded) => PreSharedKey::from_base64(encoded).map_err(ConfigError::InvalidSecret)?,
            None => PreSharedKey::from_passphrase(&shared_secret),
        };
        let default_room = lookup("MURMUR_ROOM")
            .map(|room| room.trim().to_string())
            .filter(|room| !room.is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM.into());

        if shared_key.is_empty() {
            warn!("MURMUR_SHARED_SECRET is empty, every message will fail to encrypt");
        } else if PLACEHOLDER_SECRETS.contains(&shared_secret.as_str()) {
            warn!("MURMUR_SHARED_SECRET is still a placeholder, messages are not private");
        }

        Ok(Self {
            api_base,
            ws_base,
            shared_key,
            default_room,
        })
    }

    pub fn cipher(&self) -> Cipher {
        Cipher::new(self.shared_key.clone())
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base.as_str())
            .field("ws_base", &self.ws_base.as_str())
            .field("default_room", &self.default_room)
            .finish_non_exhaustive()
    }
}

fn parse_base(var: &'static str, value: String, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|e| ConfigError::InvalidUrl {
        var,
        value: value.clone(),
        reason: e.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrl {
            var,
            reason: format!("scheme must be one of {}", schemes.join(", ")),
            value,
        });
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::NotABase(value));
    }
    Ok(url)
}

/// Append path segments to `base`. Segments are percent-encoded.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ConfigError> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| ConfigError::NotABase(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `{api_base}/api/messages/{room_id}`
pub fn history_url(api_base: &Url, room_id: &str) -> Result<Url, ConfigError> {
    endpoint(api_base, &["api", "messages", room_id])
}

/// `{ws_base}/ws/{room_id}?token={access_token}`
pub fn live_url(ws_base: &Url, room_id: &str, access_token: &str) -> Result<Url, ConfigError> {
    let mut url = endpoint(ws_base, &["ws", room_id])?;
    url.query_pairs_mut().append_pair("token", access_token);
    Ok(url)
}
