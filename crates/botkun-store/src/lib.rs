//! Durable per-thread turn persistence and the bounded conversation window.
//!
//! A `Turn` is one persisted conversational message keyed by id and partitioned
//! by thread timestamp. `ThreadWindow` enforces the fixed retained-turn count:
//! turns beyond the most recent `capacity` are deleted from the store, not
//! merely hidden.

mod sqlite_store;
mod store;
mod window;

pub use sqlite_store::SqliteMessageStore;
pub use store::{MessageStore, StorageError, Turn};
pub use window::{AppliedWindow, ThreadWindow, DEFAULT_WINDOW_CAPACITY};
