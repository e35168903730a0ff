//! Murmur chat client core.
//!
//! [`SessionEngine`] is the entry point: it joins rooms, merges history with
//! the live stream, and encrypts outgoing text. [`AuthClient`] obtains the
//! [`Identity`](murmur_types::api::Identity) it needs.

pub mod auth;
pub mod channel;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod event;
pub mod history;
pub mod timeline;
pub mod transport;

pub use auth::AuthClient;
pub use channel::{ChannelOutput, ChannelState, LiveChannel};
pub use config::ClientConfig;
pub use decode::{DECRYPTION_FAILED, MessageDecoder};
pub use engine::{SessionEngine, SessionSnapshot};
pub use error::{AuthError, ChannelError, ConfigError, HistoryError, SessionError, TransportError};
pub use event::{SessionEvent, SessionEventKind};
pub use history::{HistoryLoader, HistorySource, HttpHistory};
pub use timeline::Timeline;
pub use transport::{Connector, TransportEvent, TransportHandle, TransportSink, WsConnector};
