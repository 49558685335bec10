//! Interactive chat mode handler.
//!
//! Runs a readline loop that sends each line as a chat turn and streams the
//! reply to the terminal. Ctrl-C while a reply is streaming cancels that
//! session; Ctrl-C at the prompt exits.

use crate::commands::build_service;
use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::{ChatRequest, ChatService, StreamChunk};
use colored::Colorize;
use futures::StreamExt;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;

/// Mutable REPL state between turns
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChatState {
    conversation: Option<String>,
    search: bool,
}

impl ChatState {
    fn prompt(&self) -> String {
        if self.search {
            format!("{} ", "[search] >>".cyan())
        } else {
            format!("{} ", ">>".cyan())
        }
    }
}

/// Start interactive chat mode
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `conversation` - Existing conversation to continue
/// * `search` - Whether turns start with search augmentation enabled
pub async fn run_chat(config: Config, conversation: Option<String>, search: bool) -> Result<()> {
    let service = build_service(&config)?;

    if let Some(id) = &conversation {
        // Fail early on an unknown id instead of on the first turn.
        let history = service.history(id)?;
        println!(
            "{}",
            format!("Continuing conversation {} ({} messages)", id, history.len()).dimmed()
        );
    }

    let mut state = ChatState {
        conversation,
        search,
    };
    let mut rl = DefaultEditor::new()?;
    print_welcome_banner(&config);

    loop {
        match rl.readline(&state.prompt()) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_special_command(trimmed) {
                    Ok(SpecialCommand::Exit) => break,
                    Ok(SpecialCommand::Help) => {
                        print_help();
                        continue;
                    }
                    Ok(SpecialCommand::NewConversation) => {
                        state.conversation = None;
                        println!("{}\n", "Started a new conversation".green());
                        continue;
                    }
                    Ok(SpecialCommand::SetSearch(enabled)) => {
                        state.search = enabled;
                        println!(
                            "Search {}\n",
                            if enabled { "enabled" } else { "disabled" }
                        );
                        continue;
                    }
                    Ok(SpecialCommand::ShowStatus) => {
                        println!(
                            "Conversation: {}\nSearch: {}\n",
                            state.conversation.as_deref().unwrap_or("(new)"),
                            if state.search { "on" } else { "off" }
                        );
                        continue;
                    }
                    Ok(SpecialCommand::None) => {}
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        continue;
                    }
                }

                rl.add_history_entry(trimmed)?;

                let request = ChatRequest {
                    message: trimmed.to_string(),
                    conversation_id: state.conversation.clone(),
                    use_search: state.search,
                };
                match stream_turn(&service, request).await {
                    Ok(conversation_id) => state.conversation = Some(conversation_id),
                    Err(e) => eprintln!("{}", format!("Error: {:#}", e).red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Readline error: {}", e);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Stream one turn to stdout; returns the conversation id
async fn stream_turn(service: &ChatService, request: ChatRequest) -> Result<String> {
    let turn = service.start_turn(request).await?;
    let session_id = turn.session_id.clone();
    let conversation_id = turn.conversation_id.clone();
    let mut stream = turn.stream;
    let mut stdout = std::io::stdout();

    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            _ = tokio::signal::ctrl_c() => {
                service.interrupt(&session_id);
                continue;
            }
        };

        let Some(item) = item else { break };
        match item? {
            StreamChunk::Start { .. } => {}
            StreamChunk::Content { content, .. } => {
                print!("{}", content);
                stdout.flush()?;
            }
            StreamChunk::Done { .. } => {
                println!("\n");
            }
            StreamChunk::Error { error, .. } => {
                println!();
                eprintln!("{}\n", format!("[{}]", error).yellow());
            }
        }
    }

    Ok(conversation_id)
}

fn print_welcome_banner(config: &Config) {
    let model = match config.provider.provider_type.as_str() {
        "openai" => config.provider.openai.model.as_str(),
        _ => config.provider.ollama.model.as_str(),
    };
    println!(
        "\n{} ({} / {})",
        "chatstream interactive chat".bold(),
        config.provider.provider_type,
        model
    );
    println!("Type {} for commands, {} to leave.\n", "/help".cyan(), "exit".cyan());
}
