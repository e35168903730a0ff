use murmur_types::Message;

/// Ordered messages of the active room.
///
/// Only the session engine mutates a timeline. History arrives as one block
/// and is placed ahead of any live messages already appended.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    messages: Vec<Message>,
    history_merged: bool,
}

impl Timeline {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn push_live(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Prepend the history block. Returns `false` if history was already merged.
    pub(crate) fn merge_history(&mut self, history: Vec<Message>) -> bool {
        if self.history_merged {
            return false;
        }
        self.history_merged = true;
        let live = std::mem::replace(&mut self.messages, history);
        self.messages.extend(live);
        true
    }
}
