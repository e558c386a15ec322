//! Chat-completion client used to turn retrieved context into an answer.
//!
//! Mirrors the embedding adapter: a small trait for the processing layer to depend on, and an
//! OpenAI-backed implementation that issues HTTP requests directly.

use crate::config::{Config, ConfigError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced while requesting a chat completion.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// HTTP layer failed before receiving a response.
    #[error("Chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider returned an error response.
    #[error("{0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or carried no answer.
    #[error("Malformed chat response: {0}")]
    InvalidResponse(String),
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions framing the conversation.
    System,
    /// End-user content.
    User,
}

/// Single message in a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Role of the message author.
    pub role: ChatRole,
    /// Textual content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Request passed to a chat-completion provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation sent to the model.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token budget.
    pub max_tokens: u32,
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Return the trimmed content of the first completion choice.
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError>;
}

/// Build the chat client for the current configuration.
pub fn get_chat_client(config: &Config) -> Result<Box<dyn ChatClient + Send + Sync>, ConfigError> {
    if config.openai_api_key.trim().is_empty() {
        return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
    }
    let client = OpenAiChatClient::new(
        &config.openai_base_url,
        &config.openai_api_key,
        &config.chat_model,
    )
    .map_err(|error| ConfigError::InvalidValue(format!("OPENAI_BASE_URL ({error})")))?;
    Ok(Box::new(client))
}

/// Chat client backed by the OpenAI `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    /// Construct a client for the given endpoint, credential and model.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ChatClientError> {
        let http = Client::builder().user_agent("rag-functions/chat").build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError> {
        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            "Requesting chat completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages: &request.messages,
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: CompletionResponse = response.json().await.map_err(|error| {
            ChatClientError::InvalidResponse(format!("failed to decode chat response: {error}"))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatClientError::InvalidResponse("response had no choices".into()))?
            .message
            .content
            .ok_or_else(|| ChatClientError::InvalidResponse("first choice had no content".into()))?;

        Ok(content.trim().to_string())
    }
}
