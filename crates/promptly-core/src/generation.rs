//! Text-generation clients.
//!
//! Two backends share the [`Generator`] trait: the Anthropic Messages API,
//! read as a server-sent event stream, and any OpenAI-compatible chat
//! completions endpoint via `async-openai`.

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::error::{ApiError, OpenAIError};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{Credentials, ProviderConfig, ProviderKind};
use crate::error::{Result, SummaryError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A service that turns a system instruction and a user message into text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Return the complete generated text.
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

/// Build the configured generator.
///
/// Fails with [`SummaryError::MissingCredential`] before any network call
/// when no API key was resolved.
pub fn from_config(config: &ProviderConfig, credentials: &Credentials) -> Result<Arc<dyn Generator>> {
    let api_key = credentials
        .generation_key
        .clone()
        .ok_or_else(|| SummaryError::MissingCredential(config.api_key_env.clone()))?;

    let generator: Arc<dyn Generator> = match config.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicGenerator::new(config, api_key)?),
        ProviderKind::OpenAi => Arc::new(OpenAiGenerator::new(config, api_key)),
    };
    Ok(generator)
}

/// Streaming client for the Anthropic Messages API.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicGenerator {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self> {
        // No overall timeout: the reply streams for as long as the model writes.
        let client = reqwest::Client::builder()
            .user_agent(concat!("promptly-summary/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system,
            "stream": true,
            "messages": [{
                "role": "user",
                "content": [{"type": "text", "text": user}]
            }]
        });

        debug!("Sending {} byte message to {}", user.len(), self.model);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| SummaryError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status("anthropic", status, detail));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut text = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| SummaryError::Transport(format!("Stream interrupted: {}", e)))?;
            for data in decoder.push(&chunk) {
                apply_event(&data, &mut text)?;
            }
        }
        for data in decoder.finish() {
            apply_event(&data, &mut text)?;
        }

        debug!("Received {} chars from {}", text.len(), self.model);
        Ok(text)
    }
}

fn classify_status(service: &str, status: StatusCode, detail: String) -> SummaryError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        SummaryError::Auth {
            service: service.to_string(),
            message: format!("HTTP {}", status.as_u16()),
        }
    } else {
        SummaryError::Transport(format!("HTTP {}: {}", status.as_u16(), detail))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    Error { error: StreamError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

fn apply_event(data: &str, text: &mut String) -> Result<()> {
    match serde_json::from_str::<StreamEvent>(data)? {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text: chunk },
        } => text.push_str(&chunk),
        StreamEvent::Error { error } if error.kind == "authentication_error" => {
            return Err(SummaryError::Auth {
                service: "anthropic".into(),
                message: error.message,
            });
        }
        StreamEvent::Error { error } => {
            return Err(SummaryError::Transport(format!(
                "{}: {}",
                error.kind, error.message
            )));
        }
        _ => {}
    }
    Ok(())
}

/// Incremental server-sent events decoder yielding each event's `data`.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return the data of every event it completed.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.take_line(&line[..line.len() - 1], &mut events);
        }
        events
    }

    /// Flush a trailing event not terminated by a blank line.
    pub(crate) fn finish(mut self) -> Vec<String> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buf);
        if !rest.is_empty() {
            self.take_line(&rest, &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn take_line(&mut self, line: &[u8], events: &mut Vec<String>) {
        let decoded = String::from_utf8_lossy(line);
        let line = decoded.strip_suffix('\r').unwrap_or(&decoded);
        if line.is_empty() {
            self.dispatch(events);
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(config: &ProviderConfig, api_key: String) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_base(&config.api_base)
            .with_api_key(api_key);
        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| SummaryError::Config(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| SummaryError::Config(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .build()
            .map_err(|e| SummaryError::Config(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| match e {
                OpenAIError::ApiError(api) if is_auth_error(&api) => SummaryError::Auth {
                    service: "openai".into(),
                    message: api.message,
                },
                other => SummaryError::Transport(other.to_string()),
            })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SummaryError::Transport("No choices in response".into()))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

/// Whether an OpenAI-style error body reports a rejected credential.
///
/// The client does not expose the HTTP status, so this reads the body. Servers
/// disagree on which of `type` and `code` they fill in.
fn is_auth_error(api: &ApiError) -> bool {
    let kind = api.r#type.as_deref().unwrap_or_default();
    let code = api.code.as_deref().unwrap_or_default();
    if kind == "authentication_error" || code == "invalid_api_key" {
        return true;
    }
    let message = api.message.to_ascii_lowercase();
    kind == "invalid_request_error" && (message.contains("api key") || message.contains("api_key"))
}
