use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use botkun_ai::MessageRole;
use rusqlite::{params, Connection};

use crate::{MessageStore, StorageError, Turn};

/// SQLite-backed `MessageStore`.
///
/// Turns are keyed by `id` with a secondary index on `thread_ts`. The
/// connection lives behind a mutex; concurrent invocations are serialized by
/// it and by SQLite's own busy handling.
pub struct SqliteMessageStore {
    connection: Mutex<Connection>,
}

impl SqliteMessageStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let connection = Connection::open(path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            CREATE TABLE IF NOT EXISTS turns (
                id TEXT PRIMARY KEY,
                thread_ts TEXT NOT NULL,
                content TEXT NOT NULL,
                said_at TEXT NOT NULL,
                role TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_turns_thread_ts ON turns(thread_ts);
            "#,
        )?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.connection.lock().map_err(|_| StorageError::Poisoned)
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(&self, turn: &Turn) -> Result<(), StorageError> {
        turn.validate()?;
        let connection = self.lock()?;
        connection.execute(
            "INSERT OR REPLACE INTO turns (id, thread_ts, content, said_at, role)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![turn.id, turn.thread_ts, turn.content, turn.said_at, turn.role.as_str()],
        )?;
        Ok(())
    }

    async fn list_by_thread(&self, thread_ts: &str) -> Result<Vec<Turn>, StorageError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT id, thread_ts, content, said_at, role FROM turns WHERE thread_ts = ?1")?;
        let rows = statement.query_map(params![thread_ts], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (id, thread_ts, content, said_at, role) = row?;
            let role = MessageRole::parse(&role)
                .ok_or_else(|| StorageError::InvalidTurn(format!("unknown role '{role}' for turn {id}")))?;
            turns.push(Turn {
                id,
                thread_ts,
                content,
                said_at,
                role,
            });
        }
        Ok(turns)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let connection = self.lock()?;
        // Missing rows delete zero rows, which keeps the operation idempotent.
        connection.execute("DELETE FROM turns WHERE id = ?1", params![id])?;
        Ok(())
    }
}
