//! Match-scoped presence tracking
//!
//! Heartbeat-driven connection signal for players inside a match. Presence
//! is informational only: clients render a "reconnecting" banner from it,
//! but no match ever changes state because a player went quiet.

use crate::config::PresenceSettings;
use crate::error::{MatchmakingError, Result};
use crate::store::{ArenaStore, PresenceStore};
use crate::types::{PresenceRecord, PresenceStatus, UserId};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

/// Statistics about presence tracking operations
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    /// Heartbeats recorded
    pub heartbeats_recorded: u64,
    /// Sweep passes completed
    pub sweeps_completed: u64,
    /// Online records flipped offline by sweeps
    pub records_expired: u64,
}

/// Presence of one player's opponent, as seen by the observing player
#[derive(Debug, Clone, PartialEq)]
pub struct OpponentPresence {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
    /// Online and heard from within the liveness window
    pub is_live: bool,
}

/// Tracks player presence within matches
pub struct PresenceTracker {
    /// Backing store for presence records
    store: Arc<dyn ArenaStore>,
    /// Presence behavior settings
    settings: PresenceSettings,
    /// Tracker statistics
    stats: Arc<RwLock<TrackerStats>>,
}

impl PresenceTracker {
    /// Create a new presence tracker
    pub fn new(store: Arc<dyn ArenaStore>, settings: PresenceSettings) -> Self {
        Self {
            store,
            settings,
            stats: Arc::new(RwLock::new(TrackerStats::default())),
        }
    }

    /// Announce a player as online in a match
    pub async fn start_presence(&self, match_id: &str, user_id: &str) -> Result<PresenceRecord> {
        let record = PresenceRecord {
            user_id: user_id.to_string(),
            status: PresenceStatus::Online,
            last_seen: Utc::now(),
        };
        self.store.set_presence(match_id, record.clone()).await?;

        info!(
            "Presence started - match: {}, user: '{}'",
            match_id, user_id
        );
        Ok(record)
    }

    /// Record a heartbeat, refreshing the player's last-seen timestamp
    ///
    /// A heartbeat from a player previously marked offline brings them back
    /// online.
    pub async fn heartbeat(&self, match_id: &str, user_id: &str) -> Result<PresenceRecord> {
        let record = PresenceRecord {
            user_id: user_id.to_string(),
            status: PresenceStatus::Online,
            last_seen: Utc::now(),
        };
        self.store.set_presence(match_id, record.clone()).await?;

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire tracker stats lock".to_string(),
                })?;
            stats.heartbeats_recorded += 1;
        }

        debug!("Heartbeat - match: {}, user: '{}'", match_id, user_id);
        Ok(record)
    }

    /// Announce a clean disconnect
    pub async fn stop_presence(&self, match_id: &str, user_id: &str) -> Result<PresenceRecord> {
        let record = PresenceRecord {
            user_id: user_id.to_string(),
            status: PresenceStatus::Offline,
            last_seen: Utc::now(),
        };
        self.store.set_presence(match_id, record.clone()).await?;

        info!(
            "Presence stopped - match: {}, user: '{}'",
            match_id, user_id
        );
        Ok(record)
    }

    /// Observe the opponent's presence: current view plus live updates
    ///
    /// The observer's own records are filtered out; every remaining event
    /// carries a liveness verdict computed against the configured window.
    pub async fn observe_opponent(
        &self,
        match_id: &str,
        user_id: &str,
    ) -> Result<(Option<OpponentPresence>, impl Stream<Item = OpponentPresence>)> {
        let receiver = self.store.subscribe_presence(match_id).await?;

        let window = self.liveness_window();
        let snapshot = self
            .store
            .match_presence(match_id)
            .await?
            .into_iter()
            .find(|r| r.user_id != user_id)
            .map(|r| Self::to_opponent_view(r, window, Utc::now()));

        let me = user_id.to_string();
        let updates = BroadcastStream::new(receiver).filter_map(move |event| match event {
            Ok(record) if record.user_id != me => {
                Some(Self::to_opponent_view(record, window, Utc::now()))
            }
            _ => None,
        });

        Ok((snapshot, updates))
    }

    /// Flip online records that missed the liveness window to offline
    ///
    /// Match state is out of scope here: a stale player loses their online
    /// badge and nothing else. Returns the number of records flipped.
    pub async fn sweep_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let threshold = now - self.liveness_window();
        let stale = self.store.stale_online_records(threshold).await?;
        let expired = stale.len();

        for (match_id, record) in stale {
            let offline = PresenceRecord {
                status: PresenceStatus::Offline,
                ..record.clone()
            };
            self.store.set_presence(&match_id, offline).await?;
            debug!(
                "Marked '{}' offline in match {} - last seen: {}",
                record.user_id, match_id, record.last_seen
            );
        }

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire tracker stats lock".to_string(),
                })?;
            stats.sweeps_completed += 1;
            stats.records_expired += expired as u64;
        }

        if expired > 0 {
            info!("Presence sweep marked {} players offline", expired);
        }

        Ok(expired)
    }

    /// Get current tracker statistics
    pub fn get_stats(&self) -> Result<TrackerStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire tracker stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }

    fn liveness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.settings.liveness_window_seconds as i64)
    }

    fn to_opponent_view(
        record: PresenceRecord,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> OpponentPresence {
        let is_live =
            record.status == PresenceStatus::Online && now - record.last_seen <= window;
        OpponentPresence {
            user_id: record.user_id,
            status: record.status,
            last_seen: record.last_seen,
            is_live,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::PvpMatch;
    use crate::store::memory::InMemoryStore;
    use crate::store::MatchStore;
    use crate::types::{MatchStatus, PlayerMatchData, PvpMode, PvpPuzzle};
    use crate::utils::current_timestamp;
    use chrono::Duration;

    fn create_test_tracker() -> (PresenceTracker, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let tracker = PresenceTracker::new(store.clone(), PresenceSettings::default());
        (tracker, store)
    }

    #[tokio::test]
    async fn test_start_heartbeat_stop_roundtrip() {
        let (tracker, store) = create_test_tracker();

        let started = tracker.start_presence("match_1", "alice").await.unwrap();
        assert_eq!(started.status, PresenceStatus::Online);

        let beat = tracker.heartbeat("match_1", "alice").await.unwrap();
        assert!(beat.last_seen >= started.last_seen);

        tracker.stop_presence("match_1", "alice").await.unwrap();
        let stored = store
            .get_presence("match_1", "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PresenceStatus::Offline);

        // A later heartbeat brings the player back online
        tracker.heartbeat("match_1", "alice").await.unwrap();
        let stored = store
            .get_presence("match_1", "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PresenceStatus::Online);

        let stats = tracker.get_stats().unwrap();
        assert_eq!(stats.heartbeats_recorded, 2);
    }

    #[tokio::test]
    async fn test_observe_opponent_filters_own_events() {
        let (tracker, _store) = create_test_tracker();

        let (snapshot, updates) = tracker.observe_opponent("match_1", "alice").await.unwrap();
        assert!(snapshot.is_none());

        tracker.heartbeat("match_1", "alice").await.unwrap();
        tracker.start_presence("match_1", "bob").await.unwrap();

        tokio::pin!(updates);
        let event = tokio::time::timeout(std::time::Duration::from_secs(1), updates.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.user_id, "bob");
        assert!(event.is_live);
    }

    #[tokio::test]
    async fn test_snapshot_reports_stale_online_as_not_live() {
        let (tracker, store) = create_test_tracker();

        store
            .set_presence(
                "match_1",
                PresenceRecord {
                    user_id: "bob".to_string(),
                    status: PresenceStatus::Online,
                    last_seen: Utc::now() - Duration::seconds(60),
                },
            )
            .await
            .unwrap();

        let (snapshot, _updates) = tracker.observe_opponent("match_1", "alice").await.unwrap();
        let view = snapshot.unwrap();
        assert_eq!(view.status, PresenceStatus::Online);
        assert!(!view.is_live);
    }

    #[tokio::test]
    async fn test_sweep_flips_only_stale_online_records() {
        let (tracker, store) = create_test_tracker();
        let now = Utc::now();

        store
            .set_presence(
                "match_1",
                PresenceRecord {
                    user_id: "alice".to_string(),
                    status: PresenceStatus::Online,
                    last_seen: now - Duration::seconds(60),
                },
            )
            .await
            .unwrap();
        store
            .set_presence(
                "match_1",
                PresenceRecord {
                    user_id: "bob".to_string(),
                    status: PresenceStatus::Online,
                    last_seen: now,
                },
            )
            .await
            .unwrap();

        assert_eq!(tracker.sweep_stale(now).await.unwrap(), 1);

        let alice = store
            .get_presence("match_1", "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.status, PresenceStatus::Offline);
        // Last-seen is preserved for the client to display
        assert_eq!(alice.last_seen, now - Duration::seconds(60));

        let bob = store.get_presence("match_1", "bob").await.unwrap().unwrap();
        assert_eq!(bob.status, PresenceStatus::Online);

        // Already-offline records are not swept twice
        assert_eq!(tracker.sweep_stale(now).await.unwrap(), 0);

        let stats = tracker.get_stats().unwrap();
        assert_eq!(stats.sweeps_completed, 2);
        assert_eq!(stats.records_expired, 1);
    }

    #[tokio::test]
    async fn test_sweep_never_touches_match_state() {
        let (tracker, store) = create_test_tracker();
        let now = current_timestamp();

        let mut record = PvpMatch::new(
            "match_1",
            PvpMode::LiveBattle,
            PvpPuzzle {
                puzzle_string: "0".repeat(81),
                solution: "1".repeat(81),
                difficulty: "medium".to_string(),
            },
            vec![
                PlayerMatchData::ready("alice", "Alice", now),
                PlayerMatchData::ready("bob", "Bob", now),
            ],
            now,
        )
        .unwrap();
        record.mark_started(now, None).unwrap();
        store.create_match(record, vec![]).await.unwrap();

        store
            .set_presence(
                "match_1",
                PresenceRecord {
                    user_id: "alice".to_string(),
                    status: PresenceStatus::Online,
                    last_seen: now - Duration::minutes(5),
                },
            )
            .await
            .unwrap();

        assert_eq!(tracker.sweep_stale(Utc::now()).await.unwrap(), 1);

        // The disconnect is visible through presence, the match runs on
        let current = store.get_match("match_1").await.unwrap().unwrap();
        assert_eq!(current.status, MatchStatus::InProgress);
        assert!(current.winner_id.is_none());
    }
}
