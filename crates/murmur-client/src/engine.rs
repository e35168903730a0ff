//! Room session engine.
//!
//! Owns the timeline and the active room session. Room selection starts a
//! history fetch and a live connection concurrently; both report back as
//! [`SessionEvent`]s tagged with the selection's generation, and the engine
//! applies them one at a time in [`SessionEngine::handle`]. Events from an
//! older generation are dropped, which is what keeps a fast room switch from
//! leaking the previous room's messages into the new timeline.

use std::sync::Arc;

use murmur_crypto::Cipher;
use murmur_types::api::Identity;
use murmur_types::{ConnectionStatus, Message};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::channel::{ChannelOutput, ChannelState, LiveChannel};
use crate::config::{ClientConfig, live_url};
use crate::decode::MessageDecoder;
use crate::error::SessionError;
use crate::event::{SessionEvent, SessionEventKind};
use crate::history::{HistoryLoader, HistorySource, HttpHistory};
use crate::timeline::Timeline;
use crate::transport::{Connector, TransportEvent, TransportSink, WsConnector};

const HISTORY_UNAVAILABLE: &str = "Message history unavailable";

/// Point-in-time view of the engine for the presentation layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub room: Option<String>,
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    /// Bumped every time an error is raised, so a repeat of the same banner
    /// still reads as a new error.
    pub error_seq: u64,
    pub timeline: Vec<Message>,
    pub generation: u64,
}

struct RoomSession {
    room_id: String,
    last_error: Option<String>,
    channel: LiveChannel,
}

impl RoomSession {
    fn status(&self) -> ConnectionStatus {
        self.channel.state().status()
    }
}

pub struct SessionEngine {
    ws_base: Url,
    access_token: String,
    decoder: MessageDecoder,
    history: HistoryLoader,
    connector: Arc<dyn Connector>,

    generation: u64,
    error_seq: u64,
    session: Option<RoomSession>,
    timeline: Timeline,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionEngine {
    pub fn new(
        identity: Identity,
        cipher: Cipher,
        ws_base: Url,
        history: Arc<dyn HistorySource>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let decoder = MessageDecoder::new(cipher, identity.user_id);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());

        Self {
            ws_base,
            access_token: identity.access_token,
            history: HistoryLoader::new(history, decoder.clone()),
            decoder,
            connector,
            generation: 0,
            error_seq: 0,
            session: None,
            timeline: Timeline::default(),
            events_tx,
            events_rx,
            snapshot_tx,
        }
    }

    /// Engine wired to the HTTP history endpoint and a WebSocket live channel.
    pub fn from_config(config: &ClientConfig, identity: Identity) -> Self {
        Self::new(
            identity,
            config.cipher(),
            config.ws_base.clone(),
            Arc::new(HttpHistory::new(config.api_base.clone())),
            Arc::new(WsConnector::new()),
        )
    }

    // -- Operations --

    /// Join `room_id`, leaving the current room if any.
    ///
    /// Returns as soon as the history fetch and the live connect have been
    /// started; their results arrive through [`SessionEngine::next_event`].
    /// Must be called from within a Tokio runtime.
    pub fn select_room(&mut self, room_id: &str) -> Result<(), SessionError> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(SessionError::InvalidRoom);
        }
        let target = live_url(&self.ws_base, room_id, &self.access_token)?;

        self.release_session();
        self.generation += 1;
        let generation = self.generation;
        self.timeline = Timeline::default();
        info!("Selecting #{} (generation {})", room_id, generation);

        let mut channel = LiveChannel::new(room_id, self.decoder.clone());
        channel.open(
            target,
            self.connector.as_ref(),
            TransportSink::new(generation, self.events_tx.clone()),
        );
        self.session = Some(RoomSession {
            room_id: room_id.to_string(),
            last_error: None,
            channel,
        });

        let loader = self.history.clone();
        let events_tx = self.events_tx.clone();
        let room = room_id.to_string();
        tokio::spawn(async move {
            let result = loader.load(&room).await;
            let _ = events_tx.send(SessionEvent {
                generation,
                kind: SessionEventKind::History(result),
            });
        });

        self.publish();
        Ok(())
    }

    /// Encrypt `text` and send it to the active room.
    ///
    /// The message is not added to the timeline here; it comes back from the
    /// server like everyone else's.
    pub fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        let result = self.try_send(text);
        if let Some(session) = self.session.as_mut() {
            session.last_error = result.as_ref().err().map(ToString::to_string);
            if session.last_error.is_some() {
                self.error_seq += 1;
            }
        }
        self.publish();
        result
    }

    fn try_send(&mut self, text: &str) -> Result<(), SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let session = self.session.as_mut().ok_or(SessionError::NotConnected)?;
        if !session.status().is_connected() {
            return Err(SessionError::NotConnected);
        }

        let ciphertext = self.decoder.cipher().encrypt(text)?;
        session.channel.send(ciphertext)?;
        debug!("#{}: message sent", session.room_id);
        Ok(())
    }

    /// Close the live channel and drop all session state.
    pub fn teardown(&mut self) {
        let had_session = self.session.is_some();
        self.release_session();
        self.generation += 1;
        self.timeline = Timeline::default();
        if had_session {
            info!("Session torn down");
        }
        self.publish();
    }

    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.channel.close();
        }
    }

    // -- Event processing --

    /// Apply one async completion. Returns whether anything visible changed.
    pub fn handle(&mut self, event: SessionEvent) -> bool {
        if event.generation != self.generation {
            debug!(
                "Discarding stale event from generation {} (current {})",
                event.generation, self.generation
            );
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        match event.kind {
            SessionEventKind::History(Ok(messages)) => {
                info!("#{}: {} history messages", session.room_id, messages.len());
                if !self.timeline.merge_history(messages) {
                    return false;
                }
            }
            SessionEventKind::History(Err(e)) => {
                warn!("#{}: history unavailable: {}", session.room_id, e);
                self.timeline.merge_history(Vec::new());
                session.last_error = Some(HISTORY_UNAVAILABLE.to_string());
                self.error_seq += 1;
            }
            SessionEventKind::Transport(event) => {
                let before = session.channel.state();
                let reason = match &event {
                    TransportEvent::Error(reason) => Some(reason.clone()),
                    _ => None,
                };

                match session.channel.on_transport(event) {
                    Some(ChannelOutput::Message(message)) => self.timeline.push_live(message),
                    Some(ChannelOutput::Rejected(e)) => {
                        session.last_error = Some(format!("Failed to process incoming message: {}", e));
                        self.error_seq += 1;
                    }
                    None => {}
                }

                let after = session.channel.state();
                if before == after {
                    // Frames change the timeline, not the state
                } else if after == ChannelState::Connected {
                    session.last_error = None;
                } else if after == ChannelState::Errored {
                    session.last_error = Some(format!(
                        "Connection error: {}",
                        reason.unwrap_or_else(|| "unknown error".into())
                    ));
                    self.error_seq += 1;
                }
            }
        }

        self.publish();
        true
    }

    /// Wait for the next async completion.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Wait for and apply the next completion.
    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => self.handle(event),
            None => false,
        }
    }

    /// Apply every completion already queued, without waiting. Returns how
    /// many of them changed state.
    pub fn process_pending(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.handle(event) {
                changed += 1;
            }
        }
        changed
    }

    // -- Read-only views --

    pub fn timeline(&self) -> &[Message] {
        self.timeline.messages()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session
            .as_ref()
            .map_or(ConnectionStatus::Disconnected, RoomSession::status)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.last_error.as_deref())
    }

    pub fn room(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.room_id.as_str())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            room: self.room().map(str::to_string),
            status: self.status(),
            last_error: self.last_error().map(str::to_string),
            error_seq: self.error_seq,
            timeline: self.timeline.messages().to_vec(),
            generation: self.generation,
        }
    }

    /// Observe a fresh snapshot after every change. The receiver starts at
    /// the current state.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.send_replace(self.snapshot());
        self.snapshot_tx.subscribe()
    }

    /// Snapshots copy the timeline, so they are only built while someone is
    /// watching.
    fn publish(&self) {
        if self.snapshot_tx.receiver_count() > 0 {
            self.snapshot_tx.send_replace(self.snapshot());
        }
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("room", &self.room())
            .field("status", &self.status())
            .field("generation", &self.generation)
            .field("timeline_len", &self.timeline.messages().len())
            .finish_non_exhaustive()
    }
}
