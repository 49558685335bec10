//! Configuration management for chatstream
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatstreamError, Result};
use crate::normalize::NormalizeOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for chatstream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Generation provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat turn behaviour
    #[serde(default)]
    pub chat: ChatConfig,
    /// Web search configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Conversation storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Provider configuration
///
/// Specifies which generation provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI-compatible configuration
    #[serde(default)]
    pub openai: OpenAiConfig,
}

fn default_provider_type() -> String {
    "ollama".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL, up to and including the version segment
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model to request
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Bearer token; omitted from requests when unset
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Chat turn configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// System prompt sent ahead of every assembled context
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Number of most recent messages included in the context
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Number of search results included when search is requested
    #[serde(default = "default_search_results")]
    pub search_results: usize,

    /// Drop repeated lines across the whole reply during the deep pass
    #[serde(default = "default_dedupe_lines")]
    pub dedupe_lines: bool,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. You answer general knowledge questions, \
     help with programming and technical problems, and offer ideas and suggestions. \
     Reply in a friendly, professional tone. When search results are provided, \
     use them in your answer. Keep replies concise and avoid repeating yourself."
        .to_string()
}

fn default_history_limit() -> usize {
    10
}

fn default_search_results() -> usize {
    3
}

fn default_dedupe_lines() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            history_limit: default_history_limit(),
            search_results: default_search_results(),
            dedupe_lines: default_dedupe_lines(),
        }
    }
}

impl ChatConfig {
    /// Normalizer options derived from this configuration
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            dedupe_lines: self.dedupe_lines,
        }
    }
}

/// Web search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// HTML search endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,

    /// User agent sent with search requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_search_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            timeout_seconds: default_search_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Conversation storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; the platform data directory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatstreamError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatstreamError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("CHATSTREAM_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(host) = std::env::var("CHATSTREAM_OLLAMA_HOST") {
            self.provider.ollama.host = host;
        }

        if let Ok(model) = std::env::var("CHATSTREAM_OLLAMA_MODEL") {
            self.provider.ollama.model = model;
        }

        if let Ok(base_url) = std::env::var("CHATSTREAM_OPENAI_BASE_URL") {
            self.provider.openai.base_url = base_url;
        }

        if let Ok(model) = std::env::var("CHATSTREAM_OPENAI_MODEL") {
            self.provider.openai.model = model;
        }

        if let Ok(api_key) = std::env::var("CHATSTREAM_OPENAI_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
        {
            self.provider.openai.api_key = Some(api_key);
        }

        if let Ok(host) = std::env::var("CHATSTREAM_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("CHATSTREAM_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid CHATSTREAM_PORT: {}", port);
            }
        }

        if let Ok(path) = std::env::var("CHATSTREAM_HISTORY_DB") {
            self.storage.path = Some(PathBuf::from(path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(PathBuf::from(path));
        }

        if let crate::cli::Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let valid_providers = ["ollama", "openai"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(ChatstreamError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.provider.ollama.model.trim().is_empty() {
            return Err(
                ChatstreamError::Config("provider.ollama.model cannot be empty".to_string()).into(),
            );
        }

        if self.provider.openai.model.trim().is_empty() {
            return Err(
                ChatstreamError::Config("provider.openai.model cannot be empty".to_string()).into(),
            );
        }

        if self.chat.history_limit == 0 {
            return Err(ChatstreamError::Config(
                "chat.history_limit must be greater than 0".to_string(),
            )
            .into());
        }

        if self.search.timeout_seconds == 0 {
            return Err(ChatstreamError::Config(
                "search.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.port == 0 {
            return Err(
                ChatstreamError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        Ok(())
    }
}
