use murmur_crypto::{Cipher, CryptoError};
use murmur_types::{EncryptedEnvelope, Message, Origin, UserId};
use tracing::warn;

/// Text shown in place of a live message that could not be decrypted.
pub const DECRYPTION_FAILED: &str = "[Decryption failed]";

/// Turns envelopes into timeline messages for one local user.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    cipher: Cipher,
    local_user: UserId,
}

impl MessageDecoder {
    pub fn new(cipher: Cipher, local_user: UserId) -> Self {
        Self { cipher, local_user }
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    pub fn decrypt(&self, envelope: &EncryptedEnvelope, origin: Origin) -> Result<Message, CryptoError> {
        let text = self.cipher.decrypt(&envelope.encrypted_content)?;
        Ok(self.build(envelope, text, origin))
    }

    /// History entries that fail to decrypt are dropped.
    pub fn history(&self, envelope: &EncryptedEnvelope) -> Option<Message> {
        match self.decrypt(envelope, Origin::History) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Dropping history message from {}: {}", envelope.sender_id, e);
                None
            }
        }
    }

    /// Live messages that fail to decrypt are kept with a placeholder.
    pub fn live(&self, envelope: &EncryptedEnvelope) -> Message {
        self.decrypt(envelope, Origin::Live).unwrap_or_else(|e| {
            warn!("Live message from {} failed to decrypt: {}", envelope.sender_id, e);
            self.build(envelope, DECRYPTION_FAILED.to_string(), Origin::Live)
        })
    }

    fn build(&self, envelope: &EncryptedEnvelope, text: String, origin: Origin) -> Message {
        Message {
            sender_id: envelope.sender_id.clone(),
            text,
            timestamp: envelope.display_time(),
            sent_at: envelope.sent_at(),
            origin,
            is_own: envelope.sender_id == self.local_user,
        }
    }
}

#[cfg(test)]
mod tests {
    use murmur_crypto::PreSharedKey;

    use super::*;

    fn decoder(secret: &str, user: &str) -> MessageDecoder {
        MessageDecoder::new(Cipher::new(PreSharedKey::from_passphrase(secret)), UserId::from(user))
    }

    fn envelope(sender: &str, content: String) -> EncryptedEnvelope {
        EncryptedEnvelope {
            sender_id: UserId::from(sender),
            encrypted_content: content,
            created_at: "2024-05-01T12:00:00".into(),
        }
    }

    #[test]
    fn own_messages_are_flagged() {
        let decoder = decoder("change-me", "1");
        let content = decoder.cipher().encrypt("hello").unwrap();

        let mine = decoder.live(&envelope("1", content.clone()));
        let theirs = decoder.live(&envelope("2", content));
        assert!(mine.is_own);
        assert!(!theirs.is_own);
        assert_eq!(mine.text, "hello");
        assert_eq!(mine.origin, Origin::Live);
        assert!(mine.sent_at.is_some());
    }

    #[test]
    fn wrong_key_history_is_dropped_live_is_placeholder() {
        let sender = decoder("alice-key", "1");
        let receiver = decoder("bob-key", "2");
        let env = envelope("1", sender.cipher().encrypt("secret").unwrap());

        assert!(receiver.history(&env).is_none());
        let live = receiver.live(&env);
        assert_eq!(live.text, DECRYPTION_FAILED);
        assert_eq!(live.sender_id, UserId::from("1"));
    }
}
