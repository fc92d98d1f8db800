//! Chat transcript: ordered, append-mostly message history.
//!
//! A transcript is never empty: a synthetic greeting is the sole element at
//! creation and after `clear`. Messages are immutable once appended and ids
//! increase monotonically for the lifetime of the transcript (clears do not
//! reset the counter, so a late reply landing after a clear still gets a
//! unique id).

use crate::backend::SourceRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Greeting shown as the first assistant message of every fresh transcript.
pub const GREETING: &str = "Hello! I'm your AI assistant. I can help you find information from documents. Upload your own PDF or use the default medical encyclopedia. What would you like to know?";

/// Fixed apology appended when a chat turn fails; raw errors are only logged.
pub const APOLOGY: &str =
    "Sorry, I encountered an error while processing your question. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Source citations for assistant replies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
    /// Set when this message is the apology for a failed turn.
    #[serde(default)]
    pub error: bool,
}

/// Ordered message history; insertion order is display order.
#[derive(Debug)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        let mut transcript = Self {
            messages: Vec::new(),
            next_id: 1,
        };
        transcript.push(Role::Assistant, GREETING, Vec::new(), false);
        transcript
    }

    fn push(
        &mut self,
        role: Role,
        content: impl Into<String>,
        sources: Vec<SourceRef>,
        error: bool,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            sources,
            error,
        });
        id
    }

    /// Append a user message; returns its id.
    pub fn push_user(&mut self, content: impl Into<String>) -> u64 {
        self.push(Role::User, content, Vec::new(), false)
    }

    /// Append an assistant reply with its source citations; returns its id.
    pub fn push_assistant(&mut self, content: impl Into<String>, sources: Vec<SourceRef>) -> u64 {
        self.push(Role::Assistant, content, sources, false)
    }

    /// Append the fixed apology message with the error flag set; returns its id.
    pub fn push_apology(&mut self) -> u64 {
        self.push(Role::Assistant, APOLOGY, Vec::new(), true)
    }

    /// Reset to the single greeting message, discarding history.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.push(Role::Assistant, GREETING, Vec::new(), false);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        // Invariant: never true; kept for the len/is_empty pairing.
        self.messages.is_empty()
    }

    pub fn last(&self) -> &Message {
        self.messages.last().expect("transcript is never empty")
    }
}
