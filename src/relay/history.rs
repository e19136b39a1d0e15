//! Shared, append-only conversation history

use chrono::Utc;
use parking_lot::RwLock;

use crate::relay::message::{Author, Message, Role};

/// The single conversation log shared by every request.
///
/// All operations take the lock for their whole duration, so they are
/// linearizable with respect to each other. The lock is never held across
/// an `.await`.
#[derive(Debug, Default)]
pub struct HistoryStore {
    messages: RwLock<Vec<Message>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an already built message
    pub fn append(&self, message: Message) {
        self.messages.write().push(message);
    }

    /// Create and append a message in one step.
    ///
    /// The timestamp is taken under the write lock and never goes below the
    /// last stored one, so history timestamps are non-decreasing.
    pub fn record(&self, author: Author, role: Role, content: impl Into<String>) -> Message {
        let mut messages = self.messages.write();
        let now = Utc::now().timestamp_millis();
        let ts = messages.last().map_or(now, |last| now.max(last.ts));
        let message = Message::new(author, role, content, ts);
        messages.push(message.clone());
        message
    }

    /// Point-in-time copy of the history
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn reset(&self) {
        let cleared = {
            let mut messages = self.messages.write();
            std::mem::take(&mut *messages)
        };
        tracing::info!(cleared = cleared.len(), "History reset");
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}
