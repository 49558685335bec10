use crate::error::{ChatstreamError, Result};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub mod types;
pub use types::{fallback_title, Conversation, ConversationSummary, Message, Role};

/// Title given to conversations before their first completed turn
pub const DEFAULT_TITLE: &str = "New conversation";

/// Key-based history store consumed by the orchestrator
///
/// Implementations must keep every message attached to an existing
/// conversation and return messages in append order.
pub trait HistoryStore: Send + Sync {
    /// Append a message, advancing the conversation's `updated_at`
    ///
    /// Fails with [`ChatstreamError::ConversationNotFound`] if the
    /// conversation does not exist.
    fn append(&self, message: &Message) -> Result<()>;

    /// Messages of a conversation, oldest first
    fn list(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Create a conversation and return its id
    fn create_conversation(&self, title: &str) -> Result<String>;

    /// Replace a conversation's title
    fn rename_conversation(&self, id: &str, title: &str) -> Result<()>;

    /// Fetch a conversation record
    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;

    /// Most recently updated conversations, newest first
    fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>>;

    /// Delete a conversation and its messages; returns whether it existed
    fn delete_conversation(&self, id: &str) -> Result<bool>;
}

/// SQLite-backed conversation history
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory, unless
    /// `CHATSTREAM_HISTORY_DB` points somewhere else.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("CHATSTREAM_HISTORY_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("dev", "chatstream", "chatstream").ok_or_else(|| {
            ChatstreamError::Storage("Could not determine data directory".into())
        })?;

        Self::new_with_path(proj_dirs.data_dir().join("history.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstream::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("history.db")).unwrap();
    /// assert!(storage.path().exists());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ChatstreamError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Open the configured path, or the default location when none is set
    pub fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| ChatstreamError::Storage(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| ChatstreamError::Storage(e.to_string()))?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL
                    REFERENCES conversations (id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages (conversation_id);",
        )
        .context("Failed to create tables")
        .map_err(|e| ChatstreamError::Storage(e.to_string()))?;

        Ok(())
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn storage_error(context: &str, e: rusqlite::Error) -> anyhow::Error {
    ChatstreamError::Storage(format!("{}: {}", context, e)).into()
}

impl HistoryStore for SqliteStorage {
    fn append(&self, message: &Message) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .map_err(|e| storage_error("Failed to start transaction", e))?;

        let updated = tx
            .execute(
                "UPDATE conversations SET updated_at = ? WHERE id = ?",
                params![format_time(Utc::now()), message.conversation_id],
            )
            .map_err(|e| storage_error("Failed to touch conversation", e))?;

        if updated == 0 {
            return Err(ChatstreamError::ConversationNotFound(message.conversation_id.clone()).into());
        }

        tx.execute(
            "INSERT INTO messages (id, conversation_id, role, content, timestamp)
            VALUES (?, ?, ?, ?, ?)",
            params![
                message.id,
                message.conversation_id,
                message.role.as_str(),
                message.content,
                format_time(message.timestamp)
            ],
        )
        .map_err(|e| storage_error("Failed to insert message", e))?;

        tx.commit()
            .map_err(|e| storage_error("Failed to commit transaction", e))?;

        tracing::debug!(
            "Appended {} message {} to conversation {}",
            message.role,
            message.id,
            message.conversation_id
        );
        Ok(())
    }

    fn list(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, role, content, timestamp
                FROM messages
                WHERE conversation_id = ?
                ORDER BY rowid",
            )
            .map_err(|e| storage_error("Failed to prepare statement", e))?;

        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| storage_error("Failed to query messages", e))?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, role, content, timestamp) =
                row.map_err(|e| storage_error("Failed to read message", e))?;
            messages.push(Message {
                id,
                conversation_id: conversation_id.to_string(),
                role: role.parse()?,
                content,
                timestamp: parse_time(&timestamp),
            });
        }

        Ok(messages)
    }

    fn create_conversation(&self, title: &str) -> Result<String> {
        let conn = self.connect()?;
        let id = Uuid::new_v4().to_string();
        let now = format_time(Utc::now());

        conn.execute(
            "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
            params![id, title, now, now],
        )
        .map_err(|e| storage_error("Failed to insert conversation", e))?;

        tracing::debug!("Created conversation {}", id);
        Ok(id)
    }

    fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        let conn = self.connect()?;
        let updated = conn
            .execute(
                "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?",
                params![title, format_time(Utc::now()), id],
            )
            .map_err(|e| storage_error("Failed to rename conversation", e))?;

        if updated == 0 {
            return Err(ChatstreamError::ConversationNotFound(id.to_string()).into());
        }
        Ok(())
    }

    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| storage_error("Failed to query conversation", e))?;

        Ok(row.map(|(id, title, created_at, updated_at)| Conversation {
            id,
            title,
            created_at: parse_time(&created_at),
            updated_at: parse_time(&updated_at),
        }))
    }

    fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.title, c.updated_at,
                    (SELECT content FROM messages
                        WHERE conversation_id = c.id ORDER BY rowid DESC LIMIT 1),
                    (SELECT COUNT(*) FROM messages WHERE conversation_id = c.id),
                    (SELECT timestamp FROM messages
                        WHERE conversation_id = c.id ORDER BY rowid DESC LIMIT 1)
                FROM conversations c
                ORDER BY c.updated_at DESC
                LIMIT ?",
            )
            .map_err(|e| storage_error("Failed to prepare statement", e))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(|e| storage_error("Failed to query conversations", e))?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, title, updated_at, last_message, count, last_time) =
                row.map_err(|e| storage_error("Failed to read conversation", e))?;
            let timestamp = parse_time(last_time.as_deref().unwrap_or(&updated_at));
            let title = if title.trim().is_empty() {
                fallback_title(timestamp)
            } else {
                title
            };

            summaries.push(ConversationSummary {
                id,
                title,
                last_message: last_message.unwrap_or_default(),
                timestamp,
                message_count: usize::try_from(count).unwrap_or(0),
            });
        }

        Ok(summaries)
    }

    fn delete_conversation(&self, id: &str) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .map_err(|e| storage_error("Failed to start transaction", e))?;

        tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?",
            params![id],
        )
        .map_err(|e| storage_error("Failed to delete messages", e))?;
        let deleted = tx
            .execute("DELETE FROM conversations WHERE id = ?", params![id])
            .map_err(|e| storage_error("Failed to delete conversation", e))?;

        tx.commit()
            .map_err(|e| storage_error("Failed to commit transaction", e))?;

        if deleted > 0 {
            tracing::info!("Deleted conversation {}", id);
        }
        Ok(deleted > 0)
    }
}
