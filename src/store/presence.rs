//! Presence storage interface
//!
//! Presence records live alongside matches but are deliberately independent
//! of match state: they exist before a match starts and survive after it
//! ends, and nothing here ever feeds back into match transitions.

use crate::error::Result;
use crate::types::{MatchId, PresenceRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Trait for match-scoped presence storage operations
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Store or replace one user's presence record for a match
    async fn set_presence(&self, match_id: &str, record: PresenceRecord) -> Result<()>;

    /// Get one user's presence record for a match
    async fn get_presence(&self, match_id: &str, user_id: &str)
        -> Result<Option<PresenceRecord>>;

    /// All presence records for a match
    async fn match_presence(&self, match_id: &str) -> Result<Vec<PresenceRecord>>;

    /// Online records, service-wide, whose last heartbeat is older than the threshold
    async fn stale_online_records(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<(MatchId, PresenceRecord)>>;

    /// Subscribe to presence updates for a match
    async fn subscribe_presence(&self, match_id: &str) -> Result<broadcast::Receiver<PresenceRecord>>;
}
