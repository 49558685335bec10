//! Provider module for chatstream
//!
//! This module contains the fragment source abstraction and its streaming
//! implementations for Ollama and OpenAI-compatible servers.

pub mod base;
pub mod ollama;
pub mod openai;

pub use base::{ChatMessage, FragmentStream, Provider};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::ProviderConfig;
use crate::error::{ChatstreamError, Result};

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Returns error if the provider type is unknown or initialization fails
///
/// # Examples
///
/// ```
/// use chatstream::config::ProviderConfig;
/// use chatstream::providers::create_provider;
///
/// let provider = create_provider(&ProviderConfig::default()).unwrap();
/// assert_eq!(provider.name(), "ollama");
/// ```
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match config.provider_type.as_str() {
        "ollama" => Ok(Box::new(OllamaProvider::new(config.ollama.clone())?)),
        "openai" => Ok(Box::new(OpenAiProvider::new(config.openai.clone())?)),
        other => Err(ChatstreamError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}
