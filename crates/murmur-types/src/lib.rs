pub mod api;
pub mod events;
pub mod models;

pub use events::EncryptedEnvelope;
pub use models::{ConnectionStatus, Message, Origin, UserId};
