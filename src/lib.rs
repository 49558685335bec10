//! chatstream - streaming chat session and content-normalization engine
//!
//! This library relays model replies fragment by fragment, cleans the
//! repetition artifacts generation models tend to produce, and persists
//! completed turns as conversations.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `normalize`: Light per-fragment pass and deep whole-reply pass
//! - `session`: Cancellable stream sessions and their registry
//! - `context`: Prompt assembly from history and search results
//! - `orchestrator`: One chat turn from request to persisted reply
//! - `providers`: Streaming generation providers (Ollama, OpenAI-compatible)
//! - `search`: Web search collaborator (DuckDuckGo)
//! - `storage`: SQLite conversation history
//! - `server`: HTTP transport with server-sent events
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```
//! use chatstream::normalize::{deep_normalize, light_normalize};
//!
//! assert_eq!(light_normalize("Nooooo"), "No");
//! assert_eq!(deep_normalize("你好你好你好"), "你好");
//! assert_eq!(deep_normalize("Hello Hello world"), "Hello world");
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod providers;
pub mod search;
pub mod server;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChatstreamError, Result};
pub use normalize::{deep_normalize, light_normalize, NormalizeOptions};
pub use orchestrator::{ChatRequest, ChatService, StreamChunk};
pub use session::{SessionEvent, SessionRegistry, StreamSession};

#[cfg(test)]
pub mod test_utils;
