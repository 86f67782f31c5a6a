//! Chat completion wire types and the HTTP client for the remote model.

use crate::error::CompletionError;
use crate::state::Role;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const MODEL: &str = "gpt-3.5-turbo";

/// One history entry, kept exactly as it was created, loaded or returned by
/// the service. Entries built here always have `role` and `content`; loaded
/// ones may have any shape and are sent back untouched.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct ChatMessage(Value);

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self(json!({ "role": role.as_str(), "content": content.into() }))
    }

    pub fn role(&self) -> Option<&str> {
        self.0.get("role").and_then(Value::as_str)
    }

    /// Raw `content` value, if the entry has one.
    pub fn content(&self) -> Option<&Value> {
        self.0.get("content")
    }

    /// `content` when it is text, otherwise the empty string.
    pub fn content_text(&self) -> &str {
        self.content().and_then(Value::as_str).unwrap_or("")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for ChatMessage {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Something that can answer a chat request with a single message.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatMessage, CompletionError>;
}

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatMessage, CompletionError> {
        debug!(
            "POST {} ({} messages, temperature {}, max_tokens {:?})",
            self.endpoint,
            request.messages.len(),
            request.temperature,
            request.max_tokens
        );

        let mut builder = self.http.post(&self.endpoint).json(request);
        // a missing key is left for the service to reject
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = match response.text().await {
                Ok(text) => text,
                Err(err) => {
                    warn!("could not read error body for status {status}: {err}");
                    String::new()
                }
            };
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<ChatCompletionResponse>().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(CompletionError::NoChoices)
    }
}
