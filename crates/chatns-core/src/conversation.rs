//! Ordered chat transcript.

use serde::{Deserialize, Serialize};

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Text typed by the operator.
    User,
    /// Reply produced by the remote model.
    Assistant,
}

/// One transcript entry, serialized as `{role, content}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user entry.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant entry.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation history sent in full on every invocation.
///
/// Entries alternate user/assistant. A turn is opened with
/// [`begin_turn`](Self::begin_turn) and either committed with
/// [`complete_turn`](Self::complete_turn) or rolled back with
/// [`abandon_turn`](Self::abandon_turn), so failed turns never
/// show up in the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether a user entry is waiting for its reply.
    #[must_use]
    pub fn has_pending_turn(&self) -> bool {
        matches!(self.messages.last(), Some(m) if m.role == Role::User)
    }

    /// Append the user's entry for a new turn.
    ///
    /// A still-pending user entry from an earlier turn is dropped first so
    /// the transcript keeps alternating.
    pub fn begin_turn(&mut self, text: impl Into<String>) {
        if self.has_pending_turn() {
            tracing::debug!("Dropping unanswered user entry");
            self.messages.pop();
        }
        self.messages.push(ChatMessage::user(text));
    }

    /// Append the assistant's reply to the pending turn.
    pub fn complete_turn(&mut self, reply: impl Into<String>) {
        debug_assert!(self.has_pending_turn(), "reply without a pending user entry");
        self.messages.push(ChatMessage::assistant(reply));
    }

    /// Roll back the pending turn's user entry, if any.
    pub fn abandon_turn(&mut self) {
        if self.has_pending_turn() {
            self.messages.pop();
        }
    }

    /// Discard every entry. Clearing an empty conversation is a no-op.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
