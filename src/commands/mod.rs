/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `serve`   — HTTP API server
- `chat`    — Interactive terminal chat
- `history` — Conversation listing, display and deletion
- `search`  — One-off web search

Handlers are small and wire together the library components: storage,
providers, search, and the chat service.
*/

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::ChatService;
use crate::providers::create_provider;
use crate::search::{DuckDuckGoSearch, SearchProvider};
use crate::storage::SqliteStorage;
use std::sync::Arc;

pub mod chat;
pub mod history;
pub mod search;
pub mod serve;
pub mod special_commands;

/// Open the history store configured for this run
pub fn open_storage(config: &Config) -> Result<SqliteStorage> {
    let storage = SqliteStorage::open(config.storage.path.as_deref())?;
    tracing::debug!("Using history database at {}", storage.path().display());
    Ok(storage)
}

/// Build a chat service from configuration
///
/// # Errors
///
/// Returns error if storage, provider or search initialization fails
pub fn build_service(config: &Config) -> Result<ChatService> {
    let store = Arc::new(open_storage(config)?);
    let provider = Arc::from(create_provider(&config.provider)?);
    let search: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoSearch::new(&config.search)?);

    Ok(ChatService::new(&config.chat, store, provider, Some(search)))
}
