use std::sync::Arc;

use futures_util::future::BoxFuture;
use murmur_types::{EncryptedEnvelope, Message};
use tracing::{debug, warn};
use url::Url;

use crate::config::history_url;
use crate::decode::MessageDecoder;
use crate::error::HistoryError;

/// Where raw history envelopes come from.
pub trait HistorySource: Send + Sync {
    fn fetch(&self, room_id: &str) -> BoxFuture<'static, Result<Vec<EncryptedEnvelope>, HistoryError>>;
}

/// `GET {api_base}/api/messages/{room_id}`
#[derive(Debug, Clone)]
pub struct HttpHistory {
    client: reqwest::Client,
    api_base: Url,
}

impl HttpHistory {
    pub fn new(api_base: Url) -> Self {
        Self::with_client(reqwest::Client::new(), api_base)
    }

    pub fn with_client(client: reqwest::Client, api_base: Url) -> Self {
        Self { client, api_base }
    }
}

impl HistorySource for HttpHistory {
    fn fetch(&self, room_id: &str) -> BoxFuture<'static, Result<Vec<EncryptedEnvelope>, HistoryError>> {
        let client = self.client.clone();
        let url = history_url(&self.api_base, room_id);

        Box::pin(async move {
            let response = client.get(url?).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(HistoryError::Status(status.as_u16()));
            }
            let body = response.bytes().await?;
            let entries: Vec<serde_json::Value> = serde_json::from_slice(&body)?;
            Ok(envelopes_from(entries))
        })
    }
}

/// Convert raw history entries one at a time. An entry that is not a valid
/// envelope is dropped; the rest keep server order.
fn envelopes_from(entries: Vec<serde_json::Value>) -> Vec<EncryptedEnvelope> {
    let total = entries.len();
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value(entry) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!("Dropping history entry {} of {}: {}", i, total, e);
                None
            }
        })
        .collect()
}

/// Fetches a room's history and decrypts it for the timeline.
#[derive(Clone)]
pub struct HistoryLoader {
    source: Arc<dyn HistorySource>,
    decoder: MessageDecoder,
}

impl HistoryLoader {
    pub fn new(source: Arc<dyn HistorySource>, decoder: MessageDecoder) -> Self {
        Self { source, decoder }
    }

    /// Fetch and decrypt. Entries that fail to decrypt are left out; the rest
    /// keep server order.
    pub async fn load(&self, room_id: &str) -> Result<Vec<Message>, HistoryError> {
        let envelopes = self.source.fetch(room_id).await?;
        let total = envelopes.len();

        let messages: Vec<Message> = envelopes
            .iter()
            .filter_map(|envelope| self.decoder.history(envelope))
            .collect();

        if messages.len() < total {
            warn!(
                "#{}: dropped {} of {} history messages that failed to decrypt",
                room_id,
                total - messages.len(),
                total
            );
        }
        debug!("#{}: loaded {} history messages", room_id, messages.len());
        Ok(messages)
    }
}

impl std::fmt::Debug for HistoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLoader")
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}
