//! Offline chat simulation: canned answers used when the backend is down.
//!
//! Lives behind the same `ChatResponder` seam as the HTTP client so the
//! controller never branches on which one it is talking to. The fallback
//! composition only fires on a transport failure; a genuine HTTP error from
//! the backend is passed through untouched.

use crate::backend::{BackendClient, ChatError, ChatReply, ChatResponder, SourceRef};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

const CANNED: &[(&str, &[&str])] = &[
    (
        "Based on the indexed documents, here's what I found about \"{}\": the material covers this topic across several sections, with definitions, typical presentations, and the recommended handling described in context.",
        &[
            "Indexed document - Section 4.2: Diagnostic Procedures",
            "Indexed document - Chapter 7: Treatment Protocols",
            "Indexed document - Appendix C: Clinical Guidelines",
        ],
    ),
    (
        "According to the document index, regarding \"{}\": the relevant passages describe the main criteria and note the variations that depend on the surrounding circumstances.",
        &[
            "Indexed document - Volume 2, Page 234",
            "Indexed document - Case Studies Section",
        ],
    ),
    (
        "The indexed documents provide a thorough treatment of \"{}\": key points include the accepted definitions, practical recommendations, and guidelines aligned with the source material.",
        &[
            "Indexed document - Chapter 12",
            "Indexed document - Section 8.1",
        ],
    ),
];

/// Fabricates a plausible answer with a fixed citation set after an
/// artificial 1000-2000 ms delay. For offline demoing only.
#[derive(Debug, Clone, Default)]
pub struct SimulatedResponder;

#[async_trait]
impl ChatResponder for SimulatedResponder {
    async fn send_chat_message(&self, query: &str) -> Result<ChatReply, ChatError> {
        // Draw before awaiting; the rng is not Send.
        let (delay_ms, pick) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(1000..=2000u64), rng.gen_range(0..CANNED.len()))
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        let (template, sources) = CANNED[pick];
        Ok(ChatReply {
            answer: template.replace("{}", query),
            sources: sources
                .iter()
                .map(|s| SourceRef::Plain((*s).to_string()))
                .collect(),
        })
    }
}

/// Tries the HTTP backend first; only a transport failure falls back to the
/// simulator.
pub struct FallbackResponder {
    primary: BackendClient,
    fallback: SimulatedResponder,
}

impl FallbackResponder {
    pub fn new(primary: BackendClient) -> Self {
        Self {
            primary,
            fallback: SimulatedResponder,
        }
    }
}

#[async_trait]
impl ChatResponder for FallbackResponder {
    async fn send_chat_message(&self, query: &str) -> Result<ChatReply, ChatError> {
        match self.primary.send_chat_message(query).await {
            Err(ChatError::Transport(e)) => {
                log::warn!("backend unreachable, using simulated response: {}", e);
                self.fallback.send_chat_message(query).await
            }
            other => other,
        }
    }
}
