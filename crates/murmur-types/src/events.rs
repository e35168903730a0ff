use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserId;

/// Encrypted message record exchanged with the server.
///
/// History responses are JSON arrays of these and every inbound live frame is
/// one of these. Outbound live frames are NOT envelopes: the client sends the
/// bare ciphertext string and the server wraps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub sender_id: UserId,
    pub encrypted_content: String,
    pub created_at: String,
}

impl EncryptedEnvelope {
    /// Server instant of this envelope, if `created_at` parses.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        parse_server_time(&self.created_at)
    }

    /// Display time for this envelope. Falls back to the raw server string.
    pub fn display_time(&self) -> String {
        match self.sent_at() {
            Some(at) => format_display_time(at),
            None => self.created_at.clone(),
        }
    }
}

/// Parse a server timestamp.
///
/// The server writes naive UTC ISO-8601 (`2024-05-01T12:34:56.123456`);
/// RFC 3339 and the SQLite `YYYY-MM-DD HH:MM:SS` shape are accepted too.
pub fn parse_server_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// 12-hour local clock time, e.g. `03:45 PM`.
pub fn format_display_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%I:%M %p").to_string()
}
