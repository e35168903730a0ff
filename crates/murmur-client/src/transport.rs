//! Live socket plumbing.
//!
//! A [`Connector`] opens one socket per room selection and reports what
//! happens on it as [`TransportEvent`]s through a [`TransportSink`]. The
//! channel state machine in [`crate::channel`] never touches a socket
//! directly, which keeps it testable with a fake connector.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::TransportError;
use crate::event::{SessionEvent, SessionEventKind};

/// Something that happened on the underlying socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    /// A text frame, still JSON-encoded.
    Frame(String),
    Error(String),
    Closed,
}

/// Delivers transport events to the engine, tagged with the generation of the
/// room selection that opened the socket.
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl TransportSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once the engine is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                kind: SessionEventKind::Transport(event),
            })
            .is_ok()
    }
}

/// Opens live connections.
pub trait Connector: Send + Sync {
    /// Start connecting to `target`. Must not block; progress is reported
    /// through `sink`.
    fn connect(&self, target: Url, sink: TransportSink) -> Box<dyn TransportHandle>;
}

/// Caller side of one open connection.
pub trait TransportHandle: Send {
    fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Ask the connection to close. Safe to call more than once.
    fn close(&mut self);
}

enum Outbound {
    Text(String),
    Close,
}

/// WebSocket connector backed by `tokio-tungstenite`.
///
/// Each connection runs on its own Tokio task, so `connect` must be called
/// from within a runtime.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect(&self, target: Url, sink: TransportSink) -> Box<dyn TransportHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(target, sink, rx));
        Box::new(WsHandle { outbound: Some(tx) })
    }
}

struct WsHandle {
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

impl TransportHandle for WsHandle {
    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let tx = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        tx.send(Outbound::Text(frame)).map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(Outbound::Close);
        }
    }
}

/// Socket task: connect, then pump outbound frames and inbound events until
/// either side closes. The token lives in the query string, so only the path
/// is ever logged.
async fn run_socket(target: Url, sink: TransportSink, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
    let path = target.path().to_string();
    let generation = sink.generation();

    // Nothing is sent before Opened, so anything on `outbound` here means close.
    let (ws_stream, _) = tokio::select! {
        result = connect_async(target.as_str()) => match result {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Live connection to {} failed: {}", path, e);
                sink.emit(TransportEvent::Error(e.to_string()));
                return;
            }
        },
        _ = outbound.recv() => {
            debug!("Abandoned connect to {}", path);
            sink.emit(TransportEvent::Closed);
            return;
        }
    };

    info!("Live connection open on {} (generation {})", path, generation);
    if !sink.emit(TransportEvent::Opened) {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(WsMessage::text(text)).await {
                        warn!("Send on {} failed: {}", path, e);
                        sink.emit(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
                // Explicit close, or the handle was dropped
                Some(Outbound::Close) | None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    debug!("Closed live connection on {}", path);
                    sink.emit(TransportEvent::Closed);
                    return;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if !sink.emit(TransportEvent::Frame(text.as_str().to_owned())) {
                        return;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Server closed live connection on {}", path);
                    sink.emit(TransportEvent::Closed);
                    return;
                }
                Some(Ok(_)) => {} // ping/pong handled by tungstenite, binary unused
                Some(Err(e)) => {
                    warn!("Live connection on {} errored: {}", path, e);
                    sink.emit(TransportEvent::Error(e.to_string()));
                    return;
                }
            },
        }
    }
}
