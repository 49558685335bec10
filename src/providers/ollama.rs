//! Ollama provider implementation for chatstream
//!
//! Streams replies from an Ollama server's `/api/chat` endpoint, which
//! answers with newline-delimited JSON objects until one carries `done: true`.

use crate::config::OllamaConfig;
use crate::error::{ChatstreamError, Result};
use crate::providers::base::{check_status, line_fragments, LineOutcome};
use crate::providers::{ChatMessage, FragmentStream, Provider};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use chatstream::config::OllamaConfig;
/// use chatstream::providers::{ChatMessage, OllamaProvider, Provider};
/// use futures::StreamExt;
///
/// # async fn example() -> chatstream::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default())?;
/// let mut fragments = provider.stream(&[ChatMessage::user("Hello!")]).await?;
/// while let Some(fragment) = fragments.next().await {
///     print!("{}", fragment?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// One line of a streamed Ollama response
#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstream::config::OllamaConfig;
    /// use chatstream::providers::OllamaProvider;
    ///
    /// let config = OllamaConfig {
    ///     host: "http://localhost:11434".to_string(),
    ///     model: "qwen2.5:7b".to_string(),
    /// };
    /// let provider = OllamaProvider::new(config);
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("chatstream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ChatstreamError::Provider(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self { client, config })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }
}

fn parse_line(line: &str) -> Result<LineOutcome> {
    if line.trim().is_empty() {
        return Ok(LineOutcome::Skip);
    }

    let chunk: OllamaChunk = serde_json::from_str(line).map_err(|e| {
        ChatstreamError::Provider(format!("Failed to parse Ollama stream line: {}", e))
    })?;

    if let Some(error) = chunk.error {
        return Err(ChatstreamError::Provider(format!("Ollama error: {}", error)).into());
    }

    match chunk.message {
        Some(message) if !message.content.is_empty() => Ok(LineOutcome::Fragment(message.content)),
        _ if chunk.done => Ok(LineOutcome::Done),
        _ => Ok(LineOutcome::Skip),
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        let request = OllamaRequest {
            model: &self.config.model,
            messages,
            stream: true,
        };

        tracing::debug!("Sending Ollama request: {} messages", messages.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                ChatstreamError::Provider(format!("Ollama request failed: {}", e))
            })?;

        let response = check_status(response, "Ollama").await?;
        Ok(line_fragments(response, "Ollama", parse_line))
    }
}
