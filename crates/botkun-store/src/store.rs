use async_trait::async_trait;
use botkun_ai::MessageRole;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One persisted conversational message tied to a thread.
///
/// There is no update operation: a turn is written once, read during window
/// retrieval, and destroyed only by overflow eviction.
pub struct Turn {
    pub id: String,
    #[serde(rename = "threadTs")]
    pub thread_ts: String,
    pub content: String,
    #[serde(rename = "saidAt")]
    pub said_at: String,
    pub role: MessageRole,
}

impl Turn {
    /// Composes the store key from the upstream message id, the role tag, and
    /// the user id. Ids are never reused.
    pub fn compose_id(client_msg_id: &str, role: MessageRole, user: &str) -> String {
        format!("{client_msg_id}#{}#{user}", role.as_str())
    }

    pub(crate) fn validate(&self) -> Result<(), StorageError> {
        if self.id.trim().is_empty() {
            return Err(StorageError::InvalidTurn("turn id cannot be empty".to_string()));
        }
        if self.thread_ts.trim().is_empty() {
            return Err(StorageError::InvalidTurn("thread_ts cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
/// Failures raised by the message store backend.
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid turn: {0}")]
    InvalidTurn(String),
    #[error("store mutex is poisoned")]
    Poisoned,
}

#[async_trait]
/// Durable persistence and retrieval of turns, queryable by thread.
pub trait MessageStore: Send + Sync {
    /// Writes one turn. Idempotent on `id`: re-appending the same id replaces
    /// the record rather than failing.
    async fn append(&self, turn: &Turn) -> Result<(), StorageError>;

    /// Returns every turn whose `thread_ts` matches, in unspecified order.
    /// Callers sort by `said_at`.
    async fn list_by_thread(&self, thread_ts: &str) -> Result<Vec<Turn>, StorageError>;

    /// Removes one turn. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}
