use std::sync::Arc;

use futures_util::future::join_all;

use crate::{MessageStore, StorageError, Turn};

/// Policy default for the retained-turn count per thread.
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

#[derive(Debug)]
/// Result of one window pass over a thread.
pub struct AppliedWindow {
    /// The most recent turns, ascending by `said_at`. Always correct even when
    /// some eviction deletes failed.
    pub retained: Vec<Turn>,
    /// Number of overflow turns successfully deleted.
    pub evicted: usize,
    /// Best-effort eviction failures. These never block the response; they
    /// only risk unbounded store growth.
    pub eviction_errors: Vec<StorageError>,
}

/// Enforces the maximum retained-turn count for a thread.
///
/// The thread's turns are partitioned into two explicit, non-mutating sets:
/// the retained window (the `capacity` most recent by `said_at`) and the
/// overflow set (everything earlier), which is deleted from the store.
pub struct ThreadWindow {
    store: Arc<dyn MessageStore>,
    capacity: usize,
}

impl ThreadWindow {
    pub fn new(store: Arc<dyn MessageStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fetches, orders, and truncates the thread to its retained window,
    /// deleting the overflow set from the store.
    ///
    /// A fetch failure is an error; individual delete failures are collected
    /// into `eviction_errors`. Deletes are issued concurrently and joined
    /// before returning. Ties on `said_at` are left in whatever order the
    /// sort produces.
    pub async fn apply(&self, thread_ts: &str) -> Result<AppliedWindow, StorageError> {
        let mut turns = self.store.list_by_thread(thread_ts).await?;
        turns.sort_by(|a, b| a.said_at.cmp(&b.said_at));

        let boundary = turns.len().saturating_sub(self.capacity);
        let retained = turns[boundary..].to_vec();
        let overflow = &turns[..boundary];

        let deletions = overflow.iter().map(|turn| self.store.delete(&turn.id));
        let mut evicted = 0;
        let mut eviction_errors = Vec::new();
        for result in join_all(deletions).await {
            match result {
                Ok(()) => evicted += 1,
                Err(error) => eviction_errors.push(error),
            }
        }

        Ok(AppliedWindow {
            retained,
            evicted,
            eviction_errors,
        })
    }
}
