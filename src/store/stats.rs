//! Stats storage interface

use crate::error::Result;
use crate::types::PvpStats;
use async_trait::async_trait;

/// Trait for aggregate stats storage operations
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Get a user's aggregate record
    async fn get_stats(&self, user_id: &str) -> Result<Option<PvpStats>>;

    /// Store or replace a user's aggregate record
    async fn upsert_stats(&self, stats: PvpStats) -> Result<()>;
}
