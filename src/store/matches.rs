//! Match storage interface
//!
//! Match creation and mutation go through atomic store operations: creation
//! claims both queue entries in the same write, and updates run a closure
//! against the current record under the store's write boundary. That boundary
//! is the only synchronization the lifecycle logic relies on.

use crate::error::Result;
use crate::lifecycle::PvpMatch;
use crate::types::{PvpMove, QueueEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};

/// Transition applied to a match record inside the store's write boundary
///
/// Returns `Ok(true)` when the record was mutated (observers are notified),
/// `Ok(false)` for an idempotent no-op, and an error to reject the update
/// leaving the record unchanged.
pub type MatchUpdate = Box<dyn FnOnce(&mut PvpMatch) -> Result<bool> + Send>;

/// Trait for match storage operations
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Atomically insert a match and claim its queue entries
    ///
    /// `claimed_entries` carry their post-claim state (`matched`, pointing at
    /// the new match). The write fails as a whole, applying nothing, unless
    /// every claimed entry is currently stored and still `waiting`.
    async fn create_match(&self, record: PvpMatch, claimed_entries: Vec<QueueEntry>)
        -> Result<()>;

    /// Get a match by ID
    async fn get_match(&self, match_id: &str) -> Result<Option<PvpMatch>>;

    /// Run a transition against the current record, atomically
    ///
    /// Returns the post-update record and whether the closure mutated it.
    async fn update_match(&self, match_id: &str, update: MatchUpdate) -> Result<(PvpMatch, bool)>;

    /// Watch a match document for changes
    ///
    /// The receiver holds the latest snapshot immediately.
    async fn watch_match(&self, match_id: &str) -> Result<watch::Receiver<PvpMatch>>;

    /// In-progress matches whose deadline has passed
    async fn overdue_matches(&self, now: DateTime<Utc>) -> Result<Vec<PvpMatch>>;

    /// Number of matches that are waiting or in progress
    async fn count_active_matches(&self) -> Result<usize>;

    /// Append a move to a match's log
    ///
    /// Enforces the per-player sequence: `entry.move_number` must be exactly
    /// one past the player's last logged move, else the append is rejected
    /// with a sequence error and the log is unchanged.
    async fn append_move(&self, match_id: &str, entry: PvpMove) -> Result<()>;

    /// Ordered move log snapshot plus a live feed of subsequent appends
    ///
    /// Snapshot and subscription are taken under the same write boundary, so
    /// no move is ever missed between the two.
    async fn moves_with_updates(
        &self,
        match_id: &str,
    ) -> Result<(Vec<PvpMove>, broadcast::Receiver<PvpMove>)>;
}
