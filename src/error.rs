//! Error types for chatstream
//!
//! This module defines the error types used throughout the service,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for chatstream operations
///
/// Covers configuration loading, generation providers, conversation
/// storage, web search, and stream interruption.
#[derive(Error, Debug)]
pub enum ChatstreamError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (connection failures, bad responses, stream faults)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Conversation storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The referenced conversation does not exist
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Web search errors
    #[error("Search error: {0}")]
    Search(String),

    /// A stream session was cancelled before it completed
    #[error("interrupted")]
    Interrupted,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for chatstream operations
///
/// Uses `anyhow::Error` so callers can attach context while still being able
/// to downcast to [`ChatstreamError`].
pub type Result<T> = anyhow::Result<T>;
