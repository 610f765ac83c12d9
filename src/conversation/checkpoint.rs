//! Checkpoint stores that keep conversation state between turns.

use super::ConversationState;
use crate::error::{RagChatError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, instrument};

/// Persists conversation state keyed by thread id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest saved state of a thread.
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>>;

    /// Replace the saved state of the thread.
    async fn save(&self, state: &ConversationState) -> Result<()>;

    /// Forget a thread. Returns whether it existed.
    async fn delete(&self, thread_id: &str) -> Result<bool>;
}

/// Process-local checkpoint store.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> RagChatError {
    RagChatError::Checkpoint("checkpoint lock poisoned".to_string())
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        Ok(self.threads.read().map_err(poisoned)?.get(thread_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        self.threads
            .write()
            .map_err(poisoned)?
            .insert(state.thread_id().to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        Ok(self.threads.write().map_err(poisoned)?.remove(thread_id).is_some())
    }
}

/// SQLite checkpoint store; the state is kept as JSON.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS conversations (
        thread_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        state_json TEXT NOT NULL,
        message_count INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id);
"#;

impl SqliteCheckpointStore {
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        info!("Initialized conversation store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RagChatError::Checkpoint(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM conversations WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| {
            serde_json::from_str(&j)
                .map_err(|e| RagChatError::Checkpoint(format!("Corrupt state for {}: {}", thread_id, e)))
        })
        .transpose()
    }

    #[instrument(skip(self, state), fields(thread = state.thread_id(), messages = state.len()))]
    async fn save(&self, state: &ConversationState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO conversations (thread_id, user_id, state_json, message_count, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                state.thread_id(),
                state.user_id(),
                json,
                state.len() as i64,
                state.updated_at().to_rfc3339(),
            ],
        )?;
        debug!("Saved checkpoint");
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM conversations WHERE thread_id = ?1",
            params![thread_id],
        )?;
        Ok(deleted > 0)
    }
}
