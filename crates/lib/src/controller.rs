//! Conversation controller: transcript, busy gate, active index, and
//! transient notifications.
//!
//! One controller instance per session, driven from a single task. A chat
//! turn is split into `begin_turn` / `finish_turn` so a clear issued while a
//! request is in flight lands the late reply on the reset transcript (the
//! documented, accepted race); `send_message` is the inline convenience for
//! callers that do not interleave.

use crate::auth::Credential;
use crate::backend::{BackendClient, ChatError, ChatReply, ChatResponder, IndexError};
use crate::backend::{UploadError, UploadResult, DEFAULT_INDEX};
use crate::transcript::Transcript;
use std::time::Duration;
use tokio::time::Instant;

/// How long a notification stays visible.
pub const NOTIFICATION_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Transient status banner; at most one live at a time.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    expires_at: Instant,
}

/// A turn accepted by `begin_turn`: the trimmed text to send.
#[derive(Debug)]
pub struct PendingTurn {
    pub text: String,
}

pub struct ConversationController<R: ChatResponder> {
    gateway: BackendClient,
    responder: R,
    transcript: Transcript,
    busy: bool,
    active_index: String,
    notification: Option<Notification>,
}

impl<R: ChatResponder> ConversationController<R> {
    pub fn new(gateway: BackendClient, responder: R) -> Self {
        Self {
            gateway,
            responder,
            transcript: Transcript::new(),
            busy: false,
            active_index: DEFAULT_INDEX.to_string(),
            notification: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn active_index(&self) -> &str {
        &self.active_index
    }

    /// Start a chat turn: reject blank input and double submissions without
    /// dispatching anything; otherwise append the user message optimistically
    /// and raise the busy flag.
    pub fn begin_turn(&mut self, input: &str) -> Option<PendingTurn> {
        let text = input.trim();
        if text.is_empty() || self.busy {
            return None;
        }
        self.transcript.push_user(text);
        self.busy = true;
        Some(PendingTurn {
            text: text.to_string(),
        })
    }

    /// Land a finished turn on whatever transcript exists now. A failure of
    /// any kind becomes the fixed apology message; the raw error is logged,
    /// never shown.
    pub fn finish_turn(&mut self, outcome: Result<ChatReply, ChatError>) {
        match outcome {
            Ok(reply) => {
                self.transcript.push_assistant(reply.answer, reply.sources);
            }
            Err(e) => {
                log::error!("chat turn failed: {}", e);
                self.transcript.push_apology();
            }
        }
        self.busy = false;
    }

    /// One full chat turn through the responder. Returns false when the
    /// submission was rejected (blank input or a turn already in flight).
    pub async fn send_message(&mut self, input: &str) -> bool {
        let Some(turn) = self.begin_turn(input) else {
            return false;
        };
        let outcome = self.responder.send_chat_message(&turn.text).await;
        self.finish_turn(outcome);
        true
    }

    /// Reset the transcript to the greeting. Allowed while busy; an in-flight
    /// turn is not cancelled and will land on the reset transcript.
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    /// Switch the active index. Local state changes only after the backend
    /// acknowledges; a rejected switch leaves everything untouched.
    pub async fn switch_active_index(
        &mut self,
        credential: Option<&Credential>,
        index: &str,
    ) -> Result<(), IndexError> {
        self.gateway.switch_index(credential, index).await?;
        self.active_index = index.to_string();
        self.notify(format!("Switched to document: {}", index), Severity::Success);
        Ok(())
    }

    /// Upload a document; on success the new index becomes the active one and
    /// a success notification is posted. Failures (validation included) are
    /// surfaced as an error notification.
    pub async fn upload_document(
        &mut self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResult, UploadError> {
        match self.gateway.upload_document(filename, bytes).await {
            Ok(result) => {
                self.notify(
                    format!(
                        "Successfully uploaded {}! Created {} text chunks.",
                        result.filename, result.text_chunks
                    ),
                    Severity::Success,
                );
                self.active_index = result.index_name.clone();
                Ok(result)
            }
            Err(e) => {
                self.notify(e.to_string(), Severity::Error);
                Err(e)
            }
        }
    }

    /// Local reaction to a logout: reset the transcript and confirm.
    pub fn reset_after_logout(&mut self) {
        self.transcript.clear();
        self.notify("Logged out successfully", Severity::Info);
    }

    /// Replace any current notification and restart its visibility window.
    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.notification = Some(Notification {
            message: message.into(),
            severity,
            expires_at: Instant::now() + NOTIFICATION_WINDOW,
        });
    }

    /// The live notification, if any; an expired one reads as absent.
    pub fn notification(&self) -> Option<&Notification> {
        self.notification
            .as_ref()
            .filter(|n| Instant::now() < n.expires_at)
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }
}
