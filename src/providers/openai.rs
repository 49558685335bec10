//! OpenAI-compatible provider implementation for chatstream
//!
//! Streams replies from `/chat/completions` using server-sent events. Works
//! with any server that speaks the same protocol (vLLM, llama.cpp, LM Studio).

use crate::config::OpenAiConfig;
use crate::error::{ChatstreamError, Result};
use crate::providers::base::{check_status, line_fragments, LineOutcome};
use crate::providers::{ChatMessage, FragmentStream, Provider};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI-compatible provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("chatstream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ChatstreamError::Provider(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized OpenAI-compatible provider: base_url={}, model={}",
            config.base_url,
            config.model
        );

        Ok(Self { client, config })
    }

    /// Get the configured API base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

fn parse_line(line: &str) -> Result<LineOutcome> {
    let Some(data) = line.strip_prefix("data:") else {
        // Comments, event names and blank separators carry no content.
        return Ok(LineOutcome::Skip);
    };

    let data = data.trim();
    if data.is_empty() {
        return Ok(LineOutcome::Skip);
    }
    if data == "[DONE]" {
        return Ok(LineOutcome::Done);
    }

    let chunk: CompletionChunk = serde_json::from_str(data).map_err(|e| {
        ChatstreamError::Provider(format!("Failed to parse completion chunk: {}", e))
    })?;

    if let Some(error) = chunk.error {
        return Err(ChatstreamError::Provider(format!("API error: {}", error.message)).into());
    }

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    if content.is_empty() {
        Ok(LineOutcome::Skip)
    } else {
        Ok(LineOutcome::Fragment(content))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            stream: true,
        };

        tracing::debug!(
            "Sending chat completion request: {} messages",
            messages.len()
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Chat completion request failed: {}", e);
            ChatstreamError::Provider(format!("Chat completion request failed: {}", e))
        })?;

        let response = check_status(response, "OpenAI").await?;
        Ok(line_fragments(response, "OpenAI", parse_line))
    }
}
