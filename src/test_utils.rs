//! Test utilities for chatstream
//!
//! This module provides common test utilities including temporary directory
//! management, an in-memory history store, a scripted provider, and
//! assertion helpers.

use crate::config::Config;
use crate::error::{ChatstreamError, Result};
use crate::providers::{ChatMessage, FragmentStream, Provider};
use crate::storage::{
    fallback_title, Conversation, ConversationSummary, HistoryStore, Message,
};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// Create a temporary directory for testing
///
/// # Examples
///
/// ```ignore
/// let dir = temp_dir();
/// assert!(dir.path().exists());
/// ```
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration with default values
pub fn test_config() -> Config {
    Config::default()
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
provider:
  type: openai
  openai:
    base_url: http://localhost:8080/v1
    model: test-model

server:
  host: 0.0.0.0
  port: 9000

chat:
  history_limit: 4
  search_results: 2
  dedupe_lines: false

search:
  timeout_seconds: 5
"#
    .to_string()
}

#[derive(Debug, Default)]
struct MemoryInner {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
}

/// History store kept in memory, with write-failure injection
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a storage error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Total number of stored messages across all conversations
    pub fn message_count(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChatstreamError::Storage("store unavailable".to_string()).into());
        }
        Ok(())
    }
}

impl HistoryStore for MemoryStore {
    fn append(&self, message: &Message) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
            .ok_or_else(|| ChatstreamError::ConversationNotFound(message.conversation_id.clone()))?;
        conversation.updated_at = Utc::now();
        inner.messages.push(message.clone());
        Ok(())
    }

    fn list(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    fn create_conversation(&self, title: &str) -> Result<String> {
        self.check_writable()?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        self.inner.lock().unwrap().conversations.push(Conversation {
            id: id.clone(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ChatstreamError::ConversationNotFound(id.to_string()))?;
        conversation.title = title.to_string();
        Ok(())
    }

    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.conversations.iter().find(|c| c.id == id).cloned())
    }

    fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        let inner = self.inner.lock().unwrap();
        let mut conversations = inner.conversations.clone();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(conversations
            .into_iter()
            .take(limit)
            .map(|conversation| {
                let messages: Vec<&Message> = inner
                    .messages
                    .iter()
                    .filter(|m| m.conversation_id == conversation.id)
                    .collect();
                let last = messages.last();
                let timestamp = last.map(|m| m.timestamp).unwrap_or(conversation.updated_at);
                let title = if conversation.title.trim().is_empty() {
                    fallback_title(timestamp)
                } else {
                    conversation.title.clone()
                };
                ConversationSummary {
                    id: conversation.id.clone(),
                    title,
                    last_message: last.map(|m| m.content.clone()).unwrap_or_default(),
                    timestamp,
                    message_count: messages.len(),
                }
            })
            .collect())
    }

    fn delete_conversation(&self, id: &str) -> Result<bool> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.conversations.len();
        inner.conversations.retain(|c| c.id != id);
        inner.messages.retain(|m| m.conversation_id != id);
        Ok(inner.conversations.len() != before)
    }
}

#[derive(Debug, Clone)]
enum Ending {
    Finish,
    FailAfter(usize, String),
    Pending,
    Unavailable(String),
}

/// Provider replaying a fixed list of fragments
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    fragments: Vec<String>,
    ending: Ending,
    seen: Arc<Mutex<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    /// Yield `fragments` and then finish
    pub fn new(fragments: Vec<&str>) -> Self {
        Self {
            fragments: fragments.into_iter().map(str::to_string).collect(),
            ending: Ending::Finish,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Yield `fragments` and then never finish
    pub fn pending(fragments: Vec<&str>) -> Self {
        Self {
            ending: Ending::Pending,
            ..Self::new(fragments)
        }
    }

    /// Fail the request before any fragment is produced
    pub fn unavailable(error: &str) -> Self {
        Self {
            ending: Ending::Unavailable(error.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Yield the first `count` fragments and then fault with `error`
    pub fn failing_after(mut self, count: usize, error: &str) -> Self {
        self.ending = Ending::FailAfter(count, error.to_string());
        self
    }

    /// Messages received by the most recent `stream` call
    pub fn seen_messages(&self) -> Arc<Mutex<Vec<ChatMessage>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> String {
        "scripted-model".to_string()
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
        *self.seen.lock().unwrap() = messages.to_vec();

        let fragments: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        let stream: FragmentStream = match &self.ending {
            Ending::Finish => Box::pin(stream::iter(fragments)),
            Ending::Pending => Box::pin(stream::iter(fragments).chain(stream::pending())),
            Ending::FailAfter(count, error) => {
                let error = ChatstreamError::Provider(error.clone());
                Box::pin(
                    stream::iter(fragments.into_iter().take(*count))
                        .chain(stream::once(async move { Err::<String, _>(error.into()) })),
                )
            }
            Ending::Unavailable(error) => {
                return Err(ChatstreamError::Provider(error.clone()).into());
            }
        };
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(ChatstreamError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    fn test_memory_store_rejects_unknown_conversation() {
        let store = MemoryStore::new();
        assert_error_contains(store.append(&Message::user("nope", "hi")), "not found");
    }

    #[test]
    fn test_memory_store_fail_writes() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert_error_contains(store.create_conversation("t"), "store unavailable");
    }

    #[tokio::test]
    async fn test_scripted_provider_fails_after_count() {
        let provider = ScriptedProvider::new(vec!["a", "b"]).failing_after(1, "boom");
        let items: Vec<Result<String>> = provider.stream(&[]).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(items[1].is_err());
    }
}
