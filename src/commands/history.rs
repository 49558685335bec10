use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::Result;
use crate::storage::{ConversationSummary, HistoryStore, Message, Role};
use crate::orchestrator::CONVERSATION_LIST_LIMIT;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle history commands
pub fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let storage = super::open_storage(config)?;
    run_history(&storage, command)
}

fn run_history(store: &dyn HistoryStore, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List => {
            let conversations = store.list_conversations(CONVERSATION_LIST_LIMIT)?;

            if conversations.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }

            println!("\nConversation History:");
            conversation_table(&conversations).printstd();
            println!();
            println!(
                "Use {} to continue a conversation.",
                "chatstream chat --conversation <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id } => {
            let Some(conversation) = store.get_conversation(&id)? else {
                println!("{}", format!("Conversation {} not found", id).red());
                return Ok(());
            };

            println!("\n{}", conversation.title.bold());
            println!("{}\n", conversation.id.dimmed());
            for message in store.list(&id)? {
                println!("{}", render_message(&message));
            }
        }
        HistoryCommand::Delete { id } => {
            if store.delete_conversation(&id)? {
                println!("{}", format!("Deleted conversation {}", id).green());
            } else {
                println!("{}", format!("Conversation {} not found", id).yellow());
            }
        }
    }

    Ok(())
}

fn conversation_table(conversations: &[ConversationSummary]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Last Message".bold(),
        "Updated".bold()
    ]);

    for conversation in conversations {
        let id_short: String = conversation.id.chars().take(8).collect();
        let updated = conversation
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(prettytable::row![
            id_short.cyan(),
            shorten(&conversation.title, 40),
            conversation.message_count,
            shorten(&conversation.last_message, 40),
            updated
        ]);
    }

    table
}

fn render_message(message: &Message) -> String {
    let label = match message.role {
        Role::User => message.role.label().green().bold(),
        Role::Assistant => message.role.label().blue().bold(),
        Role::System => message.role.label().dimmed(),
    };
    format!("{}: {}\n", label, message.content)
}

/// Cut `text` to `max` characters, marking the cut with `...`
fn shorten(text: &str, max: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() > max {
        let head: String = single_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        single_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use tempfile::TempDir;

    fn storage() -> (SqliteStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new_with_path(dir.path().join("history.db")).unwrap();
        (storage, dir)
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("short", 40), "short");
        assert_eq!(shorten("a\nb", 40), "a b");
        assert_eq!(shorten("abcdefghij", 8), "abcde...");
    }

    #[test]
    fn test_render_message_includes_label() {
        colored::control::set_override(false);
        let message = Message::user("c1", "hello");
        assert_eq!(render_message(&message), "User: hello\n");
    }

    #[test]
    fn test_conversation_table_has_header_and_rows() {
        let (storage, _dir) = storage();
        let id = storage.create_conversation("Title").unwrap();
        storage.append(&Message::user(&id, "hi")).unwrap();

        let table = conversation_table(&storage.list_conversations(10).unwrap());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_run_history_delete_and_show() {
        let (storage, _dir) = storage();
        let id = storage.create_conversation("Title").unwrap();

        run_history(&storage, HistoryCommand::Show { id: id.clone() }).unwrap();
        run_history(&storage, HistoryCommand::Delete { id: id.clone() }).unwrap();
        assert!(storage.get_conversation(&id).unwrap().is_none());

        run_history(&storage, HistoryCommand::Delete { id }).unwrap();
        run_history(&storage, HistoryCommand::List).unwrap();
    }
}
