use crate::domain::models::ChatMessage;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends the ordered conversation and returns the assistant's text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, InfraError>;
}

#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, serde::Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, serde::Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
    error: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaResponseMessage {
    content: Option<String>,
}

impl OllamaChatClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| InfraError::Model(format!("failed building http client: {error}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for OllamaChatClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, InfraError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| OllamaMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            stream: false,
        };

        let endpoint = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|error| InfraError::Model(format!("request failed: {error}")))?;

        let status = response.status();
        debug!(model = %self.model, status = status.as_u16(), "ollama_chat_response");
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Model(format!("failed reading chat response: {error}")))?;

        let parsed = serde_json::from_str::<OllamaChatResponse>(&body).map_err(|error| {
            InfraError::Model(format!("invalid chat response payload: {error}; http {}", status.as_u16()))
        })?;

        if let Some(error) = parsed.error {
            return Err(InfraError::Model(error));
        }
        if !status.is_success() {
            return Err(InfraError::Model(format!("http {}", status.as_u16())));
        }

        parsed
            .message
            .and_then(|message| message.content)
            .ok_or_else(|| InfraError::Model("response did not include message content".to_string()))
    }
}
