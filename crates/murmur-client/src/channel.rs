//! Live channel state machine for one room.
//!
//! [`ChannelState::on_transport`] is the pure transition function;
//! [`LiveChannel`] wraps it with the transport handle and frame decoding.
//! No automatic reconnect: an errored or closed channel stays that way until
//! the room is selected again.

use murmur_types::{ConnectionStatus, EncryptedEnvelope, Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::decode::MessageDecoder;
use crate::error::ChannelError;
use crate::transport::{Connector, TransportEvent, TransportHandle, TransportSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Connected,
    Errored,
    Disconnected,
}

impl ChannelState {
    pub fn on_transport(self, event: &TransportEvent) -> ChannelState {
        match (self, event) {
            (Self::Connecting, TransportEvent::Opened) => Self::Connected,
            (Self::Connecting | Self::Connected, TransportEvent::Error(_)) => Self::Errored,
            (_, TransportEvent::Closed) => Self::Disconnected,
            (state, _) => state,
        }
    }

    /// Connecting or connected: the only states `close()` acts on.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    pub fn status(self) -> ConnectionStatus {
        match self {
            Self::Connecting => ConnectionStatus::Connecting,
            Self::Connected => ConnectionStatus::Connected,
            Self::Errored => ConnectionStatus::Errored,
            Self::Idle | Self::Disconnected => ConnectionStatus::Disconnected,
        }
    }
}

/// What a transport event produced for the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutput {
    Message(Message),
    /// The frame was not a valid envelope; carries the parse error.
    Rejected(String),
}

pub struct LiveChannel {
    room: String,
    state: ChannelState,
    handle: Option<Box<dyn TransportHandle>>,
    decoder: MessageDecoder,
}

impl LiveChannel {
    pub fn new(room: impl Into<String>, decoder: MessageDecoder) -> Self {
        Self {
            room: room.into(),
            state: ChannelState::Idle,
            handle: None,
            decoder,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Idle -> Connecting. Ignored in any other state.
    pub fn open(&mut self, target: Url, connector: &dyn Connector, sink: TransportSink) {
        if self.state != ChannelState::Idle {
            warn!("#{}: open requested while {:?}, ignoring", self.room, self.state);
            return;
        }
        info!("#{}: connecting (generation {})", self.room, sink.generation());
        self.handle = Some(connector.connect(target, sink));
        self.state = ChannelState::Connecting;
    }

    pub fn on_transport(&mut self, event: TransportEvent) -> Option<ChannelOutput> {
        let next = self.state.on_transport(&event);

        let output = match event {
            TransportEvent::Frame(text) if self.state == ChannelState::Connected => {
                Some(self.decode_frame(&text))
            }
            TransportEvent::Frame(_) => {
                debug!("#{}: dropping frame received while {:?}", self.room, self.state);
                None
            }
            TransportEvent::Opened if next == ChannelState::Connected => {
                info!("#{}: connected", self.room);
                None
            }
            TransportEvent::Error(reason) if next == ChannelState::Errored => {
                warn!("#{}: connection error: {}", self.room, reason);
                None
            }
            TransportEvent::Closed if self.state != ChannelState::Disconnected => {
                info!("#{}: disconnected", self.room);
                None
            }
            _ => None,
        };

        if !next.is_open() {
            self.handle = None;
        }
        self.state = next;
        output
    }

    fn decode_frame(&self, text: &str) -> ChannelOutput {
        match serde_json::from_str::<EncryptedEnvelope>(text) {
            Ok(envelope) => ChannelOutput::Message(self.decoder.live(&envelope)),
            Err(e) => {
                warn!(
                    "#{}: bad frame: {} -- raw: {}",
                    self.room,
                    e,
                    preview(text)
                );
                ChannelOutput::Rejected(e.to_string())
            }
        }
    }

    /// Send a ciphertext frame. Only valid while connected.
    pub fn send(&mut self, ciphertext: String) -> Result<(), ChannelError> {
        if self.state != ChannelState::Connected {
            return Err(ChannelError::NotConnected);
        }
        let handle = self.handle.as_mut().ok_or(ChannelError::NotConnected)?;
        handle.send(ciphertext)?;
        Ok(())
    }

    /// Close the connection. A no-op unless connecting or connected.
    pub fn close(&mut self) {
        if !self.state.is_open() {
            return;
        }
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.state = ChannelState::Disconnected;
        info!("#{}: closed", self.room);
    }
}

/// First 200 characters of a frame, for logs.
fn preview(text: &str) -> &str {
    text.char_indices().nth(200).map_or(text, |(end, _)| &text[..end])
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for LiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveChannel")
            .field("room", &self.room)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
