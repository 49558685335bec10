//! Command-line interface definition for chatstream
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for serving, interactive chat, history and search.

use clap::{Parser, Subcommand};

/// chatstream - streaming chat service with persisted conversations
#[derive(Parser, Debug, Clone)]
#[command(name = "chatstream")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the conversation history database path
    #[arg(long, env = "CHATSTREAM_STORAGE_PATH")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for chatstream
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start an interactive chat in the terminal
    Chat {
        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Augment every turn with web search results
        #[arg(short, long)]
        search: bool,
    },

    /// Inspect and manage stored conversations
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Run a web search and print the results
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 5)]
        max_results: usize,
    },
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List recent conversations
    List,

    /// Show the messages of a conversation
    Show {
        /// Conversation ID
        id: String,
    },

    /// Delete a conversation and its messages
    Delete {
        /// Conversation ID
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
