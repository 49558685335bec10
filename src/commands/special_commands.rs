//! Special commands parser for interactive chat
//!
//! Commands are prefixed with `/` and are case-insensitive. `exit` and
//! `quit` are accepted without the prefix.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a fresh conversation on the next message
    NewConversation,

    /// Turn search augmentation on or off
    SetSearch(bool),

    /// Show the current conversation and search setting
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the session
    Exit,

    /// Not a special command; send the input as a chat message
    None,
}

/// Parse user input into a special command
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands or bad arguments
///
/// # Examples
///
/// ```
/// use chatstream::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/search on").unwrap(), SpecialCommand::SetSearch(true));
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    match lower.as_str() {
        "exit" | "quit" | "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        "/new" => Ok(SpecialCommand::NewConversation),
        "/search on" => Ok(SpecialCommand::SetSearch(true)),
        "/search off" => Ok(SpecialCommand::SetSearch(false)),
        input if input.starts_with("/search") => {
            let arg = input["/search".len()..].trim();
            Err(CommandError::UnsupportedArgument {
                command: "/search".to_string(),
                arg: if arg.is_empty() {
                    "(none)".to_string()
                } else {
                    arg.to_string()
                },
            })
        }
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print the special command reference
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

CONVERSATION:
  /new            - Start a new conversation
  /search on      - Include web search results in each turn
  /search off     - Stop including web search results
  /status         - Show current conversation and search setting

SESSION CONTROL:
  /help           - Show this help message
  /?              - Same as /help
  Ctrl-C          - Interrupt the reply being streamed
  exit            - Exit interactive mode
  quit            - Same as exit
"#
    );
}
