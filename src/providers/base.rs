//! Base provider trait and common types for chatstream
//!
//! A provider turns a short list of chat messages into a [`FragmentStream`]:
//! an ordered, lazily produced sequence of text fragments. Generation itself
//! is opaque to the rest of the crate.

use crate::error::{ChatstreamError, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Ordered sequence of generated text fragments
///
/// An `Err` item is a source fault; the stream should not be polled after it.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Message sent to a generation provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Creates a new system message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstream::providers::ChatMessage;
    ///
    /// let msg = ChatMessage::system("Be brief.");
    /// assert_eq!(msg.role, "system");
    /// ```
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Streaming generation provider
///
/// # Examples
///
/// ```
/// use chatstream::providers::{ChatMessage, FragmentStream, Provider};
/// use chatstream::error::Result;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn model(&self) -> String {
///         "echo-1".to_string()
///     }
///
///     async fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
///         let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
///         Ok(Box::pin(futures::stream::iter(vec![Ok(last)])))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &str;

    /// Model the provider generates with
    fn model(&self) -> String;

    /// Start generating a reply to `messages`
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or is rejected before any
    /// fragment is produced. Faults after that point arrive as stream items.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream>;
}

/// Result of parsing one line of a streaming response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineOutcome {
    Fragment(String),
    Skip,
    Done,
}

/// Splits a chunked byte body into complete lines
///
/// Bytes are buffered until a newline arrives, so multi-byte characters split
/// across chunks are decoded intact.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Remaining unterminated line, if any
    pub(crate) fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(
                String::from_utf8_lossy(&self.pending)
                    .trim_end_matches('\r')
                    .to_string(),
            )
        }
    }
}

fn provider_fault(provider: &str, detail: impl std::fmt::Display) -> anyhow::Error {
    ChatstreamError::Provider(format!("{} stream failed: {}", provider, detail)).into()
}

/// Turn a line-oriented streaming response into a [`FragmentStream`]
///
/// `parse` is called once per complete line. A parse error or a transport
/// error ends the stream with a single `Err` item.
pub(crate) fn line_fragments<F>(
    response: reqwest::Response,
    provider: &'static str,
    mut parse: F,
) -> FragmentStream
where
    F: FnMut(&str) -> Result<LineOutcome> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(provider_fault(provider, e));
                    return;
                }
            };

            for line in lines.push(&chunk) {
                match parse(&line) {
                    Ok(LineOutcome::Fragment(text)) => {
                        yield Ok(text);
                    }
                    Ok(LineOutcome::Skip) => {}
                    Ok(LineOutcome::Done) => return,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(line) = lines.finish() {
            match parse(&line) {
                Ok(LineOutcome::Fragment(text)) => {
                    yield Ok(text);
                }
                Ok(_) => {}
                Err(e) => {
                    yield Err(e);
                }
            }
        }

        tracing::debug!("{} stream ended", provider);
    })
}

/// Map a non-success HTTP status to a provider error, reading the body
pub(crate) async fn check_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    tracing::error!("{} returned error {}: {}", provider, status, error_text);
    Err(ChatstreamError::Provider(format!(
        "{} returned error {}: {}",
        provider, status, error_text
    ))
    .into())
}
