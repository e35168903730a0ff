use murmur_types::Message;

use crate::error::HistoryError;
use crate::transport::TransportEvent;

/// An async completion delivered back to the session engine.
///
/// `generation` is the room selection that started the work; the engine
/// drops events whose generation is no longer current.
#[derive(Debug)]
pub struct SessionEvent {
    pub generation: u64,
    pub kind: SessionEventKind,
}

#[derive(Debug)]
pub enum SessionEventKind {
    History(Result<Vec<Message>, HistoryError>),
    Transport(TransportEvent),
}
