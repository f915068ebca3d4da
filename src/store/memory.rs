//! In-memory store implementation
//!
//! Backs the service and its tests. One lock guards all state, which makes
//! every multi-record operation naturally atomic; live observers are notified
//! inside the same boundary so their snapshots arrive in commit order.

use crate::error::{MatchmakingError, Result};
use crate::lifecycle::PvpMatch;
use crate::store::matches::{MatchStore, MatchUpdate};
use crate::store::presence::PresenceStore;
use crate::store::queue::QueueStore;
use crate::store::stats::StatsStore;
use crate::types::{
    MatchId, MatchStatus, PresenceRecord, PresenceStatus, PvpMode, PvpMove, PvpStats, QueueEntry,
    QueueStatus, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::{broadcast, watch};

/// Buffered events per broadcast channel before slow readers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct StoreInner {
    queue: HashMap<(UserId, PvpMode), QueueEntry>,
    matches: HashMap<MatchId, PvpMatch>,
    moves: HashMap<MatchId, Vec<PvpMove>>,
    stats: HashMap<UserId, PvpStats>,
    presence: HashMap<MatchId, HashMap<UserId, PresenceRecord>>,
    queue_events: broadcast::Sender<QueueEntry>,
    match_watchers: HashMap<MatchId, watch::Sender<PvpMatch>>,
    move_streams: HashMap<MatchId, broadcast::Sender<PvpMove>>,
    presence_streams: HashMap<MatchId, broadcast::Sender<PresenceRecord>>,
}

/// In-memory implementation of the full store boundary
pub struct InMemoryStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (queue_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(StoreInner {
                queue: HashMap::new(),
                matches: HashMap::new(),
                moves: HashMap::new(),
                stats: HashMap::new(),
                presence: HashMap::new(),
                queue_events,
                match_watchers: HashMap::new(),
                move_streams: HashMap::new(),
                presence_streams: HashMap::new(),
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn upsert_entry(&self, entry: QueueEntry) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        inner
            .queue
            .insert((entry.user_id.clone(), entry.mode), entry.clone());
        let _ = inner.queue_events.send(entry);
        Ok(())
    }

    async fn get_entry(&self, user_id: &str, mode: PvpMode) -> Result<Option<QueueEntry>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner.queue.get(&(user_id.to_string(), mode)).cloned())
    }

    async fn remove_entry_if_waiting(&self, user_id: &str, mode: PvpMode) -> Result<bool> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        let key = (user_id.to_string(), mode);
        let still_waiting = inner
            .queue
            .get(&key)
            .map(|e| e.status == QueueStatus::Waiting)
            .unwrap_or(false);
        if !still_waiting {
            return Ok(false);
        }
        if let Some(mut entry) = inner.queue.remove(&key) {
            // Observers see the departing entry as cancelled
            entry.status = QueueStatus::Cancelled;
            let _ = inner.queue_events.send(entry);
        }
        Ok(true)
    }

    async fn waiting_entries(&self, mode: PvpMode) -> Result<Vec<QueueEntry>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner
            .queue
            .values()
            .filter(|e| e.mode == mode && e.status == QueueStatus::Waiting)
            .cloned()
            .collect())
    }

    async fn delete_stale_waiting(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        let stale_keys: Vec<(UserId, PvpMode)> = inner
            .queue
            .iter()
            .filter(|(_, e)| e.status == QueueStatus::Waiting && e.enqueued_at < older_than)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale_keys {
            if let Some(mut entry) = inner.queue.remove(key) {
                entry.status = QueueStatus::Cancelled;
                let _ = inner.queue_events.send(entry);
            }
        }
        Ok(stale_keys.len())
    }

    async fn subscribe_queue(&self) -> Result<broadcast::Receiver<QueueEntry>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner.queue_events.subscribe())
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn create_match(
        &self,
        record: PvpMatch,
        claimed_entries: Vec<QueueEntry>,
    ) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;

        if inner.matches.contains_key(&record.match_id) {
            return Err(MatchmakingError::InternalError {
                message: format!("match {} already exists", record.match_id),
            }
            .into());
        }

        // Verify every claim before applying anything, so a conflict leaves
        // the store exactly as it was
        for entry in &claimed_entries {
            let key = (entry.user_id.clone(), entry.mode);
            match inner.queue.get(&key) {
                Some(current) if current.status == QueueStatus::Waiting => {}
                Some(current) => {
                    return Err(MatchmakingError::InvalidTransition {
                        reason: format!(
                            "queue entry for {} is {} and cannot be claimed",
                            entry.user_id, current.status
                        ),
                    }
                    .into());
                }
                None => {
                    return Err(MatchmakingError::QueueEntryNotFound {
                        user_id: entry.user_id.clone(),
                    }
                    .into());
                }
            }
        }

        for entry in claimed_entries {
            inner
                .queue
                .insert((entry.user_id.clone(), entry.mode), entry.clone());
            let _ = inner.queue_events.send(entry);
        }
        let (tx, _) = watch::channel(record.clone());
        inner.match_watchers.insert(record.match_id.clone(), tx);
        inner.matches.insert(record.match_id.clone(), record);
        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> Result<Option<PvpMatch>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner.matches.get(match_id).cloned())
    }

    async fn update_match(&self, match_id: &str, update: MatchUpdate) -> Result<(PvpMatch, bool)> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        let record = inner
            .matches
            .get_mut(match_id)
            .ok_or_else(|| MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            })?;
        let mutated = update(record)?;
        let snapshot = record.clone();
        if mutated {
            if let Some(tx) = inner.match_watchers.get(match_id) {
                tx.send_replace(snapshot.clone());
            }
        }
        Ok((snapshot, mutated))
    }

    async fn watch_match(&self, match_id: &str) -> Result<watch::Receiver<PvpMatch>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        inner
            .match_watchers
            .get(match_id)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| {
                MatchmakingError::MatchNotFound {
                    match_id: match_id.to_string(),
                }
                .into()
            })
    }

    async fn overdue_matches(&self, now: DateTime<Utc>) -> Result<Vec<PvpMatch>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner
            .matches
            .values()
            .filter(|m| {
                m.status == MatchStatus::InProgress
                    && m.deadline_at.map(|d| d <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn count_active_matches(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner
            .matches
            .values()
            .filter(|m| !m.status.is_terminal())
            .count())
    }

    async fn append_move(&self, match_id: &str, entry: PvpMove) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        if !inner.matches.contains_key(match_id) {
            return Err(MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            }
            .into());
        }
        let log = inner.moves.entry(match_id.to_string()).or_default();
        let last = log
            .iter()
            .filter(|m| m.player_id == entry.player_id)
            .map(|m| m.move_number)
            .max()
            .unwrap_or(0);
        let expected = last + 1;
        if entry.move_number != expected {
            return Err(MatchmakingError::SequenceError {
                match_id: match_id.to_string(),
                user_id: entry.player_id.clone(),
                expected,
                got: entry.move_number,
            }
            .into());
        }
        log.push(entry.clone());
        if let Some(tx) = inner.move_streams.get(match_id) {
            let _ = tx.send(entry);
        }
        Ok(())
    }

    async fn moves_with_updates(
        &self,
        match_id: &str,
    ) -> Result<(Vec<PvpMove>, broadcast::Receiver<PvpMove>)> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        if !inner.matches.contains_key(match_id) {
            return Err(MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            }
            .into());
        }
        let history = inner.moves.get(match_id).cloned().unwrap_or_default();
        let receiver = inner
            .move_streams
            .entry(match_id.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .subscribe();
        Ok((history, receiver))
    }
}

#[async_trait]
impl StatsStore for InMemoryStore {
    async fn get_stats(&self, user_id: &str) -> Result<Option<PvpStats>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner.stats.get(user_id).cloned())
    }

    async fn upsert_stats(&self, stats: PvpStats) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        inner.stats.insert(stats.user_id.clone(), stats);
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for InMemoryStore {
    async fn set_presence(&self, match_id: &str, record: PresenceRecord) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        inner
            .presence
            .entry(match_id.to_string())
            .or_default()
            .insert(record.user_id.clone(), record.clone());
        if let Some(tx) = inner.presence_streams.get(match_id) {
            let _ = tx.send(record);
        }
        Ok(())
    }

    async fn get_presence(
        &self,
        match_id: &str,
        user_id: &str,
    ) -> Result<Option<PresenceRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner
            .presence
            .get(match_id)
            .and_then(|records| records.get(user_id))
            .cloned())
    }

    async fn match_presence(&self, match_id: &str) -> Result<Vec<PresenceRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner
            .presence
            .get(match_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn stale_online_records(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<(MatchId, PresenceRecord)>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(inner
            .presence
            .iter()
            .flat_map(|(match_id, records)| {
                records.values().filter_map(move |record| {
                    if record.status == PresenceStatus::Online && record.last_seen < older_than {
                        Some((match_id.clone(), record.clone()))
                    } else {
                        None
                    }
                })
            })
            .collect())
    }

    async fn subscribe_presence(
        &self,
        match_id: &str,
    ) -> Result<broadcast::Receiver<PresenceRecord>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        Ok(inner
            .presence_streams
            .entry(match_id.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayerMatchData, PvpPuzzle};
    use crate::utils::current_timestamp;
    use chrono::Duration;

    fn test_puzzle() -> PvpPuzzle {
        PvpPuzzle {
            puzzle_string: "0".repeat(81),
            solution: "1".repeat(81),
            difficulty: "medium".to_string(),
        }
    }

    fn waiting_entry(user_id: &str, mode: PvpMode, rating: i32) -> QueueEntry {
        QueueEntry::waiting(user_id, user_id.to_uppercase(), mode, rating, current_timestamp())
    }

    fn test_match(match_id: &str, players: &[&str]) -> PvpMatch {
        let now = current_timestamp();
        PvpMatch::new(
            match_id,
            PvpMode::BlindRace,
            test_puzzle(),
            players
                .iter()
                .map(|id| PlayerMatchData::ready(*id, id.to_uppercase(), now))
                .collect(),
            now,
        )
        .unwrap()
    }

    fn claimed(entry: &QueueEntry, match_id: &str) -> QueueEntry {
        let mut entry = entry.clone();
        entry.status = QueueStatus::Matched;
        entry.match_id = Some(match_id.to_string());
        entry
    }

    fn test_move(player_id: &str, move_number: u32) -> PvpMove {
        PvpMove {
            move_id: format!("move_{}_{}", player_id, move_number),
            player_id: player_id.to_string(),
            timestamp: current_timestamp(),
            row: 0,
            col: 0,
            value: 5,
            is_correct: true,
            move_number,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_entry() {
        let store = InMemoryStore::new();
        store
            .upsert_entry(waiting_entry("alice", PvpMode::BlindRace, 1000))
            .await
            .unwrap();
        store
            .upsert_entry(waiting_entry("alice", PvpMode::BlindRace, 1080))
            .await
            .unwrap();

        let waiting = store.waiting_entries(PvpMode::BlindRace).await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].rating, 1080);

        // Same user in the other mode is an independent entry
        store
            .upsert_entry(waiting_entry("alice", PvpMode::LiveBattle, 1000))
            .await
            .unwrap();
        assert_eq!(
            store.waiting_entries(PvpMode::BlindRace).await.unwrap().len(),
            1
        );
        assert_eq!(
            store.waiting_entries(PvpMode::LiveBattle).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_remove_entry_only_while_waiting() {
        let store = InMemoryStore::new();
        store
            .upsert_entry(waiting_entry("alice", PvpMode::BlindRace, 1000))
            .await
            .unwrap();
        assert!(store
            .remove_entry_if_waiting("alice", PvpMode::BlindRace)
            .await
            .unwrap());

        let mut matched = waiting_entry("bob", PvpMode::BlindRace, 1000);
        matched.status = QueueStatus::Matched;
        matched.match_id = Some("match_1_x".to_string());
        store.upsert_entry(matched).await.unwrap();
        assert!(!store
            .remove_entry_if_waiting("bob", PvpMode::BlindRace)
            .await
            .unwrap());
        assert!(store
            .get_entry("bob", PvpMode::BlindRace)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_create_match_claims_entries_atomically() {
        let store = InMemoryStore::new();
        let a = waiting_entry("alice", PvpMode::BlindRace, 1000);
        let b = waiting_entry("bob", PvpMode::BlindRace, 1050);
        store.upsert_entry(a.clone()).await.unwrap();
        store.upsert_entry(b.clone()).await.unwrap();

        let record = test_match("match_1_ab", &["alice", "bob"]);
        store
            .create_match(
                record.clone(),
                vec![claimed(&a, "match_1_ab"), claimed(&b, "match_1_ab")],
            )
            .await
            .unwrap();

        let stored = store.get_match("match_1_ab").await.unwrap().unwrap();
        assert_eq!(stored.player_count(), 2);
        for user in ["alice", "bob"] {
            let entry = store
                .get_entry(user, PvpMode::BlindRace)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(entry.status, QueueStatus::Matched);
            assert_eq!(entry.match_id.as_deref(), Some("match_1_ab"));
        }
        assert!(store
            .waiting_entries(PvpMode::BlindRace)
            .await
            .unwrap()
            .is_empty());

        // Watchers get the initial snapshot immediately
        let rx = store.watch_match("match_1_ab").await.unwrap();
        assert_eq!(rx.borrow().match_id, "match_1_ab");
    }

    #[tokio::test]
    async fn test_create_match_applies_nothing_on_conflict() {
        let store = InMemoryStore::new();
        let a = waiting_entry("alice", PvpMode::BlindRace, 1000);
        let mut b = waiting_entry("bob", PvpMode::BlindRace, 1050);
        b.status = QueueStatus::Matched;
        b.match_id = Some("match_0_zz".to_string());
        store.upsert_entry(a.clone()).await.unwrap();
        store.upsert_entry(b.clone()).await.unwrap();

        let record = test_match("match_1_ab", &["alice", "bob"]);
        let result = store
            .create_match(
                record,
                vec![claimed(&a, "match_1_ab"), claimed(&b, "match_1_ab")],
            )
            .await;
        assert!(result.is_err());

        // Nothing was applied: no match, alice untouched
        assert!(store.get_match("match_1_ab").await.unwrap().is_none());
        let alice = store
            .get_entry("alice", PvpMode::BlindRace)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.status, QueueStatus::Waiting);
        assert!(alice.match_id.is_none());
    }

    #[tokio::test]
    async fn test_delete_stale_waiting_spares_matched() {
        let store = InMemoryStore::new();
        let thirty_one_minutes_ago = current_timestamp() - Duration::minutes(31);

        let mut old_waiting = waiting_entry("alice", PvpMode::BlindRace, 1000);
        old_waiting.enqueued_at = thirty_one_minutes_ago;
        let mut old_matched = waiting_entry("bob", PvpMode::BlindRace, 1000);
        old_matched.enqueued_at = thirty_one_minutes_ago;
        old_matched.status = QueueStatus::Matched;
        old_matched.match_id = Some("match_0_zz".to_string());
        let fresh_waiting = waiting_entry("carol", PvpMode::BlindRace, 1000);

        store.upsert_entry(old_waiting).await.unwrap();
        store.upsert_entry(old_matched).await.unwrap();
        store.upsert_entry(fresh_waiting).await.unwrap();

        let threshold = current_timestamp() - Duration::minutes(30);
        let removed = store.delete_stale_waiting(threshold).await.unwrap();
        assert_eq!(removed, 1);

        assert!(store
            .get_entry("alice", PvpMode::BlindRace)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_entry("bob", PvpMode::BlindRace)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_entry("carol", PvpMode::BlindRace)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_update_match_notifies_watchers() {
        let store = InMemoryStore::new();
        let a = waiting_entry("alice", PvpMode::BlindRace, 1000);
        let b = waiting_entry("bob", PvpMode::BlindRace, 1050);
        store.upsert_entry(a.clone()).await.unwrap();
        store.upsert_entry(b.clone()).await.unwrap();
        store
            .create_match(
                test_match("match_1_ab", &["alice", "bob"]),
                vec![claimed(&a, "match_1_ab"), claimed(&b, "match_1_ab")],
            )
            .await
            .unwrap();

        let mut rx = store.watch_match("match_1_ab").await.unwrap();
        rx.borrow_and_update();

        let now = current_timestamp();
        let (updated, mutated) = store
            .update_match(
                "match_1_ab",
                Box::new(move |m| {
                    m.mark_started(now, None)?;
                    Ok(true)
                }),
            )
            .await
            .unwrap();
        assert!(mutated);
        assert_eq!(updated.status, MatchStatus::InProgress);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, MatchStatus::InProgress);

        // A no-op closure leaves watchers quiet
        let (_, mutated) = store
            .update_match("match_1_ab", Box::new(|_| Ok(false)))
            .await
            .unwrap();
        assert!(!mutated);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_match_fails() {
        let store = InMemoryStore::new();
        let result = store
            .update_match("match_404", Box::new(|_| Ok(true)))
            .await;
        assert!(result.is_err());
        assert!(store.watch_match("match_404").await.is_err());
    }

    #[tokio::test]
    async fn test_append_move_enforces_per_player_sequence() {
        let store = InMemoryStore::new();
        let a = waiting_entry("alice", PvpMode::LiveBattle, 1000);
        let b = waiting_entry("bob", PvpMode::LiveBattle, 1050);
        store.upsert_entry(a.clone()).await.unwrap();
        store.upsert_entry(b.clone()).await.unwrap();
        let mut record = test_match("match_1_ab", &["alice", "bob"]);
        record.mode = PvpMode::LiveBattle;
        store
            .create_match(
                record,
                vec![claimed(&a, "match_1_ab"), claimed(&b, "match_1_ab")],
            )
            .await
            .unwrap();

        store
            .append_move("match_1_ab", test_move("alice", 1))
            .await
            .unwrap();

        // Skipping ahead is rejected and leaves the log unchanged
        let err = store
            .append_move("match_1_ab", test_move("alice", 3))
            .await
            .unwrap_err();
        match err.downcast_ref::<MatchmakingError>() {
            Some(MatchmakingError::SequenceError { expected, got, .. }) => {
                assert_eq!(*expected, 2);
                assert_eq!(*got, 3);
            }
            other => panic!("expected SequenceError, got {:?}", other),
        }
        let (log, _) = store.moves_with_updates("match_1_ab").await.unwrap();
        assert_eq!(log.len(), 1);

        // Sequences are tracked per player
        store
            .append_move("match_1_ab", test_move("bob", 1))
            .await
            .unwrap();
        store
            .append_move("match_1_ab", test_move("alice", 2))
            .await
            .unwrap();
        let (log, _) = store.moves_with_updates("match_1_ab").await.unwrap();
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_moves_feed_sees_subsequent_appends() {
        let store = InMemoryStore::new();
        let a = waiting_entry("alice", PvpMode::LiveBattle, 1000);
        let b = waiting_entry("bob", PvpMode::LiveBattle, 1050);
        store.upsert_entry(a.clone()).await.unwrap();
        store.upsert_entry(b.clone()).await.unwrap();
        store
            .create_match(
                test_match("match_1_ab", &["alice", "bob"]),
                vec![claimed(&a, "match_1_ab"), claimed(&b, "match_1_ab")],
            )
            .await
            .unwrap();

        let (history, mut feed) = store.moves_with_updates("match_1_ab").await.unwrap();
        assert!(history.is_empty());

        store
            .append_move("match_1_ab", test_move("alice", 1))
            .await
            .unwrap();
        let received = feed.recv().await.unwrap();
        assert_eq!(received.player_id, "alice");
        assert_eq!(received.move_number, 1);
    }

    #[tokio::test]
    async fn test_stats_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.get_stats("alice").await.unwrap().is_none());

        let mut stats = PvpStats::new("alice");
        stats.blind_race.wins = 3;
        store.upsert_stats(stats).await.unwrap();

        let loaded = store.get_stats("alice").await.unwrap().unwrap();
        assert_eq!(loaded.blind_race.wins, 3);
        assert_eq!(loaded.live_battle.rating, crate::types::INITIAL_RATING);
    }

    #[tokio::test]
    async fn test_presence_updates_and_stale_query() {
        let store = InMemoryStore::new();
        let mut feed = store.subscribe_presence("match_1_ab").await.unwrap();

        let now = current_timestamp();
        store
            .set_presence(
                "match_1_ab",
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
                "match_1_ab",
                PresenceRecord {
                    user_id: "bob".to_string(),
                    status: PresenceStatus::Online,
                    last_seen: now,
                },
            )
            .await
            .unwrap();

        assert_eq!(feed.recv().await.unwrap().user_id, "alice");
        assert_eq!(feed.recv().await.unwrap().user_id, "bob");

        let stale = store
            .stale_online_records(now - Duration::seconds(15))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].1.user_id, "alice");

        let records = store.match_presence("match_1_ab").await.unwrap();
        assert_eq!(records.len(), 2);
    }
}
