use crate::domain::models::Transcript;
use crate::infrastructure::chat_client::ChatBackend;
use std::sync::Arc;
use tracing::{info, warn};

pub const EMPTY_REPLY_MESSAGE: &str = "⚠️ No response from AI model.";

/// Turns every model call into chat text. A failed call becomes a visible
/// message instead of an error.
pub struct ChatService<B>
where
    B: ChatBackend,
{
    backend: Arc<B>,
}

impl<B> ChatService<B>
where
    B: ChatBackend,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn send(&self, transcript: &Transcript) -> String {
        match self.backend.chat(transcript.messages()).await {
            Ok(reply) if reply.trim().is_empty() => {
                warn!(turns = transcript.len(), "model_returned_empty_reply");
                EMPTY_REPLY_MESSAGE.to_string()
            }
            Ok(reply) => {
                info!(turns = transcript.len(), reply_chars = reply.chars().count(), "model_replied");
                reply
            }
            Err(error) => {
                warn!(%error, "model_call_failed");
                format!("⚠️ Ollama error: {error}")
            }
        }
    }
}
