//! Ordered message log for one conversation

use crate::message::Message;

/// Append-only transcript. The only way to remove messages is [`Transcript::clear`].
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages in display order
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }
}
