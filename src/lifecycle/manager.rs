//! Match manager implementation for queue and match lifecycle operations
//!
//! This module provides the core MatchManager that orchestrates queue
//! membership, match creation, state transitions, the Live Battle move log,
//! and post-match stats application.

use crate::config::MatchSettings;
use crate::error::{MatchmakingError, Result};
use crate::lifecycle::instance::PvpMatch;
use crate::metrics::MetricsCollector;
use crate::puzzle::PuzzleProvider;
use crate::stats::StatsAggregator;
use crate::store::{ArenaStore, MatchStore, QueueStore, StatsStore};
use crate::types::{
    MatchStatus, MoveSubmission, PlayerMatchData, PlayerResult, PlayerStatus, PvpMode, PvpMove,
    PvpPuzzle, QueueEntry, INITIAL_RATING,
};
use crate::utils::{generate_match_id, generate_move_id};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

/// Statistics about match manager operations
#[derive(Debug, Clone, Default)]
pub struct ManagerStats {
    /// Total players joined to a queue
    pub players_joined: u64,
    /// Total players that left a queue before matching
    pub players_left: u64,
    /// Total matches created
    pub matches_created: u64,
    /// Total matches started
    pub matches_started: u64,
    /// Total matches completed
    pub matches_completed: u64,
    /// Total matches cancelled
    pub matches_cancelled: u64,
    /// Total matches force-ended past their deadline
    pub matches_force_ended: u64,
    /// Total moves appended to move logs
    pub moves_recorded: u64,
    /// Total player results recorded
    pub results_recorded: u64,
    /// Total stale queue entries cleaned up
    pub queue_entries_cleaned: u64,
}

/// The main match manager
#[derive(Clone)]
pub struct MatchManager {
    /// Backing store for queue, matches, moves, stats and presence
    store: Arc<dyn ArenaStore>,
    /// Puzzle provider for board assignment at match creation
    puzzles: Arc<dyn PuzzleProvider>,
    /// Aggregator that applies completed matches to player stats
    aggregator: Arc<StatsAggregator>,
    /// Match behavior settings
    settings: MatchSettings,
    /// Manager statistics
    stats: Arc<RwLock<ManagerStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchManager {
    /// Create a new match manager
    pub fn new(
        store: Arc<dyn ArenaStore>,
        puzzles: Arc<dyn PuzzleProvider>,
        aggregator: Arc<StatsAggregator>,
        settings: MatchSettings,
    ) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(store, puzzles, aggregator, settings, metrics_collector)
    }

    /// Create a new match manager with an explicit metrics collector
    pub fn with_metrics(
        store: Arc<dyn ArenaStore>,
        puzzles: Arc<dyn PuzzleProvider>,
        aggregator: Arc<StatsAggregator>,
        settings: MatchSettings,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            puzzles,
            aggregator,
            settings,
            stats: Arc::new(RwLock::new(ManagerStats::default())),
            metrics_collector,
        }
    }

    /// Put a player into one mode's matchmaking queue
    ///
    /// The entry snapshots the player's current rating for that mode. A
    /// repeat join replaces any previous entry for the same user and mode,
    /// waiting or matched.
    pub async fn join_matchmaking(
        &self,
        user_id: &str,
        display_name: &str,
        mode: PvpMode,
    ) -> Result<QueueEntry> {
        let start_time = Instant::now();

        let rating = self
            .store
            .get_stats(user_id)
            .await?
            .map(|stats| stats.for_mode(mode).rating)
            .unwrap_or(INITIAL_RATING);

        let entry = QueueEntry::waiting(user_id, display_name, mode, rating, Utc::now());
        self.store.upsert_entry(entry.clone()).await?;

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire manager stats lock".to_string(),
                })?;
            stats.players_joined += 1;
        }
        self.metrics_collector.record_queue_join(mode);

        info!(
            "Player joined {} queue - user: '{}', rating: {}, duration: {:.2}ms",
            mode,
            user_id,
            rating,
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        Ok(entry)
    }

    /// Remove a player's waiting entries from every mode
    ///
    /// Entries already claimed by a match stay untouched. Returns whether
    /// anything was removed.
    pub async fn leave_matchmaking(&self, user_id: &str) -> Result<bool> {
        let mut removed_any = false;

        for mode in PvpMode::ALL {
            if self.store.remove_entry_if_waiting(user_id, mode).await? {
                removed_any = true;
                self.metrics_collector.record_queue_leave(mode);
                debug!("Removed '{}' from {} queue", user_id, mode);
            }
        }

        if removed_any {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire manager stats lock".to_string(),
                })?;
            stats.players_left += 1;
        }

        Ok(removed_any)
    }

    /// Observe a player's queue entry: current snapshot plus live updates
    ///
    /// The stream carries every subsequent version of the entry, including
    /// the claim that moves it to `matched` and a final `cancelled` snapshot
    /// when the entry is removed.
    pub async fn observe_queue_entry(
        &self,
        user_id: &str,
        mode: PvpMode,
    ) -> Result<(Option<QueueEntry>, impl Stream<Item = QueueEntry>)> {
        let receiver = self.store.subscribe_queue().await?;
        let snapshot = self.store.get_entry(user_id, mode).await?;

        let user = user_id.to_string();
        let updates = BroadcastStream::new(receiver).filter_map(move |event| match event {
            Ok(entry) if entry.user_id == user && entry.mode == mode => Some(entry),
            _ => None,
        });

        Ok((snapshot, updates))
    }

    /// Create a match directly from prepared participants
    ///
    /// Used for invitational flows and tests; the engine path goes through
    /// [`MatchManager::create_match_for_pair`] instead. No queue entries are
    /// claimed.
    pub async fn create_match(
        &self,
        mode: PvpMode,
        puzzle: PvpPuzzle,
        participants: Vec<PlayerMatchData>,
    ) -> Result<PvpMatch> {
        let record = PvpMatch::new(generate_match_id(), mode, puzzle, participants, Utc::now())?;
        self.store.create_match(record.clone(), vec![]).await?;

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire manager stats lock".to_string(),
                })?;
            stats.matches_created += 1;
        }
        self.metrics_collector.record_match_created(mode);

        info!(
            "Created {} match {} directly with {} players",
            mode,
            record.match_id,
            record.player_count()
        );
        Ok(record)
    }

    /// Create a match for a queue pair, claiming both entries atomically
    ///
    /// Picks a puzzle, builds the match record, and asks the store to insert
    /// it while flipping both entries to `matched`. If either entry is no
    /// longer waiting, nothing is applied and both entries are left for the
    /// next pass.
    pub async fn create_match_for_pair(
        &self,
        mode: PvpMode,
        first: &QueueEntry,
        second: &QueueEntry,
    ) -> Result<PvpMatch> {
        let puzzle_id = self.puzzles.random_puzzle_id(None).await?;
        let puzzle = self.puzzles.get_puzzle(&puzzle_id).await?;

        let match_id = generate_match_id();
        let now = Utc::now();
        let record = PvpMatch::new(
            match_id.clone(),
            mode,
            puzzle,
            vec![
                PlayerMatchData::ready(&first.user_id, &first.display_name, now),
                PlayerMatchData::ready(&second.user_id, &second.display_name, now),
            ],
            now,
        )?;

        let mut first_claimed = first.clone();
        first_claimed.status = crate::types::QueueStatus::Matched;
        first_claimed.match_id = Some(match_id.clone());
        let mut second_claimed = second.clone();
        second_claimed.status = crate::types::QueueStatus::Matched;
        second_claimed.match_id = Some(match_id.clone());

        self.store
            .create_match(record.clone(), vec![first_claimed, second_claimed])
            .await?;

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire manager stats lock".to_string(),
                })?;
            stats.matches_created += 1;
        }
        self.metrics_collector.record_match_created(mode);

        debug!(
            "Created {} match {} for pair '{}' / '{}' on puzzle {}",
            mode, match_id, first.user_id, second.user_id, puzzle_id
        );
        Ok(record)
    }

    /// Get a match by ID
    pub async fn get_match(&self, match_id: &str) -> Result<Option<PvpMatch>> {
        self.store.get_match(match_id).await
    }

    /// Watch a match: the receiver holds the current snapshot and updates on
    /// every committed mutation
    pub async fn observe_match(&self, match_id: &str) -> Result<watch::Receiver<PvpMatch>> {
        self.store.watch_match(match_id).await
    }

    /// Start a match once both players are seated and ready
    ///
    /// Live Battle matches get a completion deadline stamped at start; Blind
    /// Race matches run without one. Starting an already started match is an
    /// `InvalidTransition`.
    pub async fn start_match(&self, match_id: &str) -> Result<PvpMatch> {
        let now = Utc::now();
        let live_duration =
            chrono::Duration::seconds(self.settings.live_battle_duration_seconds as i64);

        let (snapshot, _) = self
            .store
            .update_match(
                match_id,
                Box::new(move |m| {
                    let deadline = match m.mode {
                        PvpMode::LiveBattle => Some(now + live_duration),
                        PvpMode::BlindRace => None,
                    };
                    m.mark_started(now, deadline)?;
                    Ok(true)
                }),
            )
            .await?;

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire manager stats lock".to_string(),
                })?;
            stats.matches_started += 1;
        }
        self.metrics_collector.record_match_started(snapshot.mode);

        info!(
            "Started {} match {} - players: {}, deadline: {:?}",
            snapshot.mode,
            match_id,
            snapshot.player_count(),
            snapshot.deadline_at
        );
        Ok(snapshot)
    }

    /// Complete a match with an optional winner
    ///
    /// Re-ending a completed match is a quiet no-op that leaves the original
    /// outcome untouched. On the first completion the stats aggregator is
    /// invoked; an aggregation failure is logged but does not undo the
    /// completed transition.
    pub async fn end_match(&self, match_id: &str, winner_id: Option<&str>) -> Result<PvpMatch> {
        let now = Utc::now();
        let winner = winner_id.map(|s| s.to_string());

        let (snapshot, completed_now) = self
            .store
            .update_match(match_id, Box::new(move |m| m.mark_completed(winner, now)))
            .await?;

        if completed_now {
            {
                let mut stats = self
                    .stats
                    .write()
                    .map_err(|_| MatchmakingError::InternalError {
                        message: "Failed to acquire manager stats lock".to_string(),
                    })?;
                stats.matches_completed += 1;
            }
            self.metrics_collector
                .record_match_completed(snapshot.mode);
            self.record_match_runtime(&snapshot);

            info!(
                "Completed {} match {} - winner: {:?}",
                snapshot.mode, match_id, snapshot.winner_id
            );

            if let Err(e) = self.aggregator.apply_match(match_id).await {
                error!("Failed to apply stats for match {}: {}", match_id, e);
            }
        } else {
            debug!("Match {} already completed, end request ignored", match_id);
        }

        Ok(snapshot)
    }

    /// Cancel a match, optionally naming the player who forfeited
    ///
    /// A named forfeiter's opponent is recorded as the winner. Cancelled
    /// matches never reach the stats aggregator. Re-cancelling is a quiet
    /// no-op.
    pub async fn cancel_match(
        &self,
        match_id: &str,
        forfeiting_user: Option<&str>,
    ) -> Result<PvpMatch> {
        let now = Utc::now();
        let forfeiter = forfeiting_user.map(|s| s.to_string());

        let (snapshot, cancelled_now) = self
            .store
            .update_match(
                match_id,
                Box::new(move |m| m.mark_cancelled(forfeiter.as_deref(), now)),
            )
            .await?;

        if cancelled_now {
            {
                let mut stats = self
                    .stats
                    .write()
                    .map_err(|_| MatchmakingError::InternalError {
                        message: "Failed to acquire manager stats lock".to_string(),
                    })?;
                stats.matches_cancelled += 1;
            }
            self.metrics_collector
                .record_match_cancelled(snapshot.mode);

            info!(
                "Cancelled {} match {} - forfeiter: {:?}, winner: {:?}",
                snapshot.mode, match_id, forfeiting_user, snapshot.winner_id
            );
        }

        Ok(snapshot)
    }

    /// Update one player's status within a live match
    pub async fn update_player_status(
        &self,
        match_id: &str,
        user_id: &str,
        status: PlayerStatus,
    ) -> Result<PvpMatch> {
        let user = user_id.to_string();

        let (snapshot, _) = self
            .store
            .update_match(
                match_id,
                Box::new(move |m| {
                    let previous = m.player(&user).map(|p| p.status);
                    m.set_player_status(&user, status)?;
                    Ok(previous != Some(status))
                }),
            )
            .await?;

        Ok(snapshot)
    }

    /// Record a player's final result, exactly once per player
    ///
    /// When the second result lands the match completes automatically with
    /// the winner decided by final score; equal scores end in a draw.
    pub async fn submit_player_result(
        &self,
        match_id: &str,
        user_id: &str,
        result: PlayerResult,
    ) -> Result<PvpMatch> {
        let user = user_id.to_string();

        let (snapshot, _) = self
            .store
            .update_match(
                match_id,
                Box::new(move |m| {
                    m.record_result(&user, result)?;
                    Ok(true)
                }),
            )
            .await?;

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire manager stats lock".to_string(),
                })?;
            stats.results_recorded += 1;
        }

        info!(
            "Recorded result for '{}' in match {} - both_in: {}",
            user_id,
            match_id,
            snapshot.both_results_submitted()
        );

        if snapshot.both_results_submitted() && snapshot.status == MatchStatus::InProgress {
            let winner = snapshot.winner_by_score();
            return self.end_match(match_id, winner.as_deref()).await;
        }

        Ok(snapshot)
    }

    /// Append a move to a Live Battle match's move log
    ///
    /// Accepted only while the match is in progress and only from seated
    /// players; the store rejects out-of-sequence move numbers.
    pub async fn submit_move(&self, match_id: &str, submission: MoveSubmission) -> Result<PvpMove> {
        let record = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            })?;

        if record.mode != PvpMode::LiveBattle {
            return Err(MatchmakingError::InvalidTransition {
                reason: format!(
                    "match {} is {} and has no live move log",
                    match_id, record.mode
                ),
            }
            .into());
        }
        if record.status != MatchStatus::InProgress {
            return Err(MatchmakingError::InvalidTransition {
                reason: format!(
                    "match {} is {} and not accepting moves",
                    match_id, record.status
                ),
            }
            .into());
        }
        if !record.has_player(&submission.player_id) {
            return Err(MatchmakingError::PlayerNotFound {
                user_id: submission.player_id.clone(),
            }
            .into());
        }

        let entry = PvpMove::from_submission(generate_move_id(), submission, Utc::now());
        self.store.append_move(match_id, entry.clone()).await?;

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire manager stats lock".to_string(),
                })?;
            stats.moves_recorded += 1;
        }
        self.metrics_collector.record_move_recorded();

        Ok(entry)
    }

    /// Observe a match's move log: ordered snapshot plus live feed
    ///
    /// The snapshot and the subscription are taken atomically, so no move
    /// falls between them.
    pub async fn observe_moves(
        &self,
        match_id: &str,
    ) -> Result<(Vec<PvpMove>, broadcast::Receiver<PvpMove>)> {
        self.store.moves_with_updates(match_id).await
    }

    /// Force-end every in-progress match past its deadline
    ///
    /// The winner is decided by whatever results are already in. A failure
    /// on one match is logged and does not stop the sweep. Returns the
    /// number of matches ended.
    pub async fn force_end_overdue(&self, now: DateTime<Utc>) -> Result<usize> {
        let overdue = self.store.overdue_matches(now).await?;
        let mut ended = 0;

        for record in overdue {
            let match_id = record.match_id.clone();
            let result = self
                .store
                .update_match(
                    &match_id,
                    Box::new(move |m| {
                        let winner = m.winner_by_score();
                        m.mark_completed(winner, now)
                    }),
                )
                .await;

            match result {
                Ok((snapshot, true)) => {
                    ended += 1;
                    warn!(
                        "Force-ended overdue {} match {} - deadline: {:?}, winner: {:?}",
                        snapshot.mode, match_id, snapshot.deadline_at, snapshot.winner_id
                    );
                    self.metrics_collector
                        .record_match_completed(snapshot.mode);
                    self.record_match_runtime(&snapshot);

                    if let Err(e) = self.aggregator.apply_match(&match_id).await {
                        error!("Failed to apply stats for match {}: {}", match_id, e);
                    }
                }
                Ok((_, false)) => {
                    // Ended by another path between the snapshot and here
                }
                Err(e) => {
                    warn!("Failed to force-end match {}: {}", match_id, e);
                }
            }
        }

        if ended > 0 {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire manager stats lock".to_string(),
                })?;
            stats.matches_completed += ended as u64;
            stats.matches_force_ended += ended as u64;
        }

        Ok(ended)
    }

    /// Delete waiting queue entries older than the threshold
    ///
    /// Matched entries are never deleted regardless of age. Returns the
    /// number of entries removed.
    pub async fn cleanup_stale_queue_entries(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let cleaned = self.store.delete_stale_waiting(older_than).await?;

        if cleaned > 0 {
            {
                let mut stats = self
                    .stats
                    .write()
                    .map_err(|_| MatchmakingError::InternalError {
                        message: "Failed to acquire manager stats lock".to_string(),
                    })?;
                stats.queue_entries_cleaned += cleaned as u64;
            }
            self.metrics_collector.record_queue_cleanup(cleaned);
            info!("Cleaned up {} stale queue entries", cleaned);
        }

        Ok(cleaned)
    }

    /// Number of matches not yet in a terminal state
    pub async fn count_active_matches(&self) -> Result<usize> {
        self.store.count_active_matches().await
    }

    /// Observe the start-to-completion runtime of a freshly completed match
    fn record_match_runtime(&self, snapshot: &PvpMatch) {
        if let (Some(started), Some(ended)) = (snapshot.started_at, snapshot.ended_at) {
            if let Ok(runtime) = (ended - started).to_std() {
                self.metrics_collector
                    .record_match_duration(snapshot.mode, runtime);
            }
        }
    }

    /// Get current manager statistics
    pub fn get_stats(&self) -> Result<ManagerStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire manager stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }
}
