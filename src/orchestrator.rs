//! Conversation orchestration for one user turn
//!
//! A turn resolves or creates the conversation, persists the user message,
//! assembles the prompt, and drives a stream session over the provider's
//! fragments. The resulting [`StreamChunk`] stream starts with a `start`
//! item, relays `content` items, and ends with exactly one `done` or `error`
//! item. Only a `done` turn persists an assistant message.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::context::ContextAssembler;
use crate::error::{ChatstreamError, Result};
use crate::normalize::NormalizeOptions;
use crate::providers::{ChatMessage, FragmentStream, Provider};
use crate::search::SearchProvider;
use crate::session::{SessionEvent, SessionRegistry};
use crate::storage::{fallback_title, ConversationSummary, HistoryStore, Message, DEFAULT_TITLE};

/// Number of conversations returned by [`ChatService::conversations`]
pub const CONVERSATION_LIST_LIMIT: usize = 50;

/// Maximum number of characters kept from the first user message in a title
const TITLE_MAX_CHARS: usize = 20;

/// Item delivered downstream for a chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamChunk {
    /// First item of every turn; `session_id` is the cancellation handle
    Start {
        session_id: String,
        conversation_id: String,
    },
    /// A light-normalized fragment of the reply
    Content {
        content: String,
        conversation_id: String,
    },
    /// The reply completed and was persisted
    Done {
        conversation_id: String,
        message: Message,
    },
    /// The turn ended without a persisted reply
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
}

impl StreamChunk {
    /// Whether this chunk ends the turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamChunk::Done { .. } | StreamChunk::Error { .. })
    }
}

/// A user turn request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub use_search: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            use_search: false,
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_search(mut self, use_search: bool) -> Self {
        self.use_search = use_search;
        self
    }
}

/// A started turn
pub struct ChatTurn {
    pub session_id: String,
    pub conversation_id: String,
    /// Chunks for this turn; an `Err` item is a persistence fault
    pub stream: BoxStream<'static, Result<StreamChunk>>,
}

impl std::fmt::Debug for ChatTurn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatTurn")
            .field("session_id", &self.session_id)
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

/// Derive a conversation title from the first user message
///
/// The trimmed message is cut to 20 characters with `...` appended when it is
/// longer, then internal whitespace is collapsed. An empty result falls back
/// to a timestamp title.
///
/// # Examples
///
/// ```
/// use chatstream::orchestrator::derive_title;
///
/// assert_eq!(
///     derive_title("This is a fairly long opening question about design"),
///     "This is a fairly lon..."
/// );
/// assert_eq!(derive_title("  short\tone "), "short one");
/// ```
pub fn derive_title(message: &str) -> String {
    let trimmed = message.trim();
    let truncated = if trimmed.chars().count() > TITLE_MAX_CHARS {
        let head: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    };

    let title = truncated.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        fallback_title(Utc::now())
    } else {
        title
    }
}

/// Runs chat turns against a store, a provider and an optional search
pub struct ChatService {
    store: Arc<dyn HistoryStore>,
    provider: Arc<dyn Provider>,
    search: Option<Arc<dyn SearchProvider>>,
    registry: SessionRegistry,
    assembler: ContextAssembler,
    system_prompt: String,
    normalize: NormalizeOptions,
}

impl ChatService {
    pub fn new(
        config: &ChatConfig,
        store: Arc<dyn HistoryStore>,
        provider: Arc<dyn Provider>,
        search: Option<Arc<dyn SearchProvider>>,
    ) -> Self {
        Self {
            store,
            provider,
            search,
            registry: SessionRegistry::new(),
            assembler: ContextAssembler::from_config(config),
            system_prompt: config.system_prompt.clone(),
            normalize: config.normalize_options(),
        }
    }

    /// Registry of live sessions for this service
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Search collaborator, if one is configured
    pub fn search_provider(&self) -> Option<Arc<dyn SearchProvider>> {
        self.search.clone()
    }

    /// Request cancellation of a live session
    pub fn interrupt(&self, session_id: &str) -> bool {
        self.registry.cancel(session_id)
    }

    /// Most recently updated conversations
    pub fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.store.list_conversations(CONVERSATION_LIST_LIMIT)
    }

    /// Messages of a conversation, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`ChatstreamError::ConversationNotFound`] for an unknown id
    pub fn history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        if self.store.get_conversation(conversation_id)?.is_none() {
            return Err(ChatstreamError::ConversationNotFound(conversation_id.to_string()).into());
        }
        self.store.list(conversation_id)
    }

    /// Delete a conversation and its messages
    pub fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        self.store.delete_conversation(conversation_id)
    }

    /// Start a chat turn
    ///
    /// The user message is persisted before this returns. Errors here are
    /// persistence faults or an unknown `conversation_id`; faults of the
    /// provider are reported in-stream as an `error` chunk.
    pub async fn start_turn(&self, request: ChatRequest) -> Result<ChatTurn> {
        let (conversation_id, created) = match request.conversation_id.as_deref() {
            Some(id) => {
                if self.store.get_conversation(id)?.is_none() {
                    return Err(ChatstreamError::ConversationNotFound(id.to_string()).into());
                }
                (id.to_string(), false)
            }
            None => (self.store.create_conversation(DEFAULT_TITLE)?, true),
        };

        self.store
            .append(&Message::user(&conversation_id, &request.message))?;
        let history = self.store.list(&conversation_id)?;

        let search = if request.use_search {
            self.search.as_deref()
        } else {
            None
        };
        let context = self
            .assembler
            .assemble(&history, &request.message, search)
            .await;
        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(context),
        ];

        let session = self.registry.begin();
        let session_id = session.id().to_string();
        tracing::info!(
            "Starting stream session {} for conversation {} with {}",
            session_id,
            conversation_id,
            self.provider.name()
        );

        let source = provider_source(Arc::clone(&self.provider), messages);
        let mut events = session.drive(source, self.normalize);

        let store = Arc::clone(&self.store);
        let first_message = request.message;
        let start = StreamChunk::Start {
            session_id: session_id.clone(),
            conversation_id: conversation_id.clone(),
        };
        let turn_conversation = conversation_id.clone();

        let stream = async_stream::stream! {
            let conversation_id = turn_conversation;
            yield Ok(start);

            while let Some(event) = events.next().await {
                match event {
                    SessionEvent::Fragment(content) => {
                        yield Ok(StreamChunk::Content {
                            content,
                            conversation_id: conversation_id.clone(),
                        });
                    }
                    SessionEvent::Completed(text) => {
                        match finish_turn(store.as_ref(), &conversation_id, text, created, &first_message) {
                            Ok(message) => {
                                yield Ok(StreamChunk::Done {
                                    conversation_id: conversation_id.clone(),
                                    message,
                                });
                            }
                            Err(e) => {
                                tracing::error!("Failed to persist reply for {}: {:#}", conversation_id, e);
                                yield Err(e);
                            }
                        }
                        break;
                    }
                    SessionEvent::Interrupted => {
                        yield Ok(StreamChunk::Error {
                            error: ChatstreamError::Interrupted.to_string(),
                            conversation_id: Some(conversation_id.clone()),
                        });
                        break;
                    }
                    SessionEvent::Failed(error) => {
                        yield Ok(StreamChunk::Error {
                            error,
                            conversation_id: Some(conversation_id.clone()),
                        });
                        break;
                    }
                }
            }
        };

        Ok(ChatTurn {
            session_id,
            conversation_id,
            stream: Box::pin(stream),
        })
    }
}

/// Defer the provider call until the session first polls; a failed call
/// becomes a faulting source.
fn provider_source(provider: Arc<dyn Provider>, messages: Vec<ChatMessage>) -> FragmentStream {
    let source = stream::once(async move { provider.stream(&messages).await })
        .map(|started| match started {
            Ok(fragments) => fragments,
            Err(e) => Box::pin(stream::once(async move { Err::<String, _>(e) })) as FragmentStream,
        })
        .flatten();
    Box::pin(source)
}

fn finish_turn(
    store: &dyn HistoryStore,
    conversation_id: &str,
    text: String,
    first_turn: bool,
    first_message: &str,
) -> Result<Message> {
    let message = Message::assistant(conversation_id, text);
    store.append(&message)?;
    if first_turn {
        store.rename_conversation(conversation_id, &derive_title(first_message))?;
    }
    Ok(message)
}
