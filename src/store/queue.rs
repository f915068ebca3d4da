//! Queue storage interface
//!
//! The matchmaking queue holds at most one entry per `(user, mode)`. All
//! mutations are conditional on the entry's current status so that concurrent
//! matching passes and client calls cannot claim the same entry twice.

use crate::error::Result;
use crate::types::{PvpMode, QueueEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Trait for queue entry storage operations
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert or replace the entry for `(entry.user_id, entry.mode)`
    async fn upsert_entry(&self, entry: QueueEntry) -> Result<()>;

    /// Get the entry for a user in one mode
    async fn get_entry(&self, user_id: &str, mode: PvpMode) -> Result<Option<QueueEntry>>;

    /// Remove the entry for a user in one mode, only while it is still waiting
    ///
    /// Returns whether an entry was removed. Entries already claimed by a
    /// match are left untouched.
    async fn remove_entry_if_waiting(&self, user_id: &str, mode: PvpMode) -> Result<bool>;

    /// All entries currently waiting in one mode's queue
    async fn waiting_entries(&self, mode: PvpMode) -> Result<Vec<QueueEntry>>;

    /// Delete waiting entries enqueued before the threshold
    ///
    /// Matched entries are never deleted regardless of age. Returns the
    /// number of entries removed.
    async fn delete_stale_waiting(&self, older_than: DateTime<Utc>) -> Result<usize>;

    /// Subscribe to queue entry updates (upserts and claims)
    async fn subscribe_queue(&self) -> Result<broadcast::Receiver<QueueEntry>>;
}
