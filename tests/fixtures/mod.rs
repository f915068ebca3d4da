//! Test fixtures and helpers for integration testing

use chrono::{DateTime, Utc};
use grid_arena::config::{MatchSettings, PresenceSettings, SchedulerSettings};
use grid_arena::lifecycle::MatchManager;
use grid_arena::matching::MatchingEngine;
use grid_arena::presence::PresenceTracker;
use grid_arena::puzzle::{MockPuzzleProvider, PuzzleProvider};
use grid_arena::rating::{EloRatingCalculator, EloSettings};
use grid_arena::scheduler::SchedulerDriver;
use grid_arena::stats::StatsAggregator;
use grid_arena::store::{ArenaStore, InMemoryStore, QueueStore, StatsStore};
use grid_arena::types::{PlayerResult, PvpMode, PvpStats, QueueEntry};
use std::sync::Arc;

/// Complete in-process service wiring for integration tests
///
/// Every component shares one store, exactly as in production, but the
/// puzzle provider is the recording mock so tests can inject failures.
pub struct ArenaTestSystem {
    pub store: Arc<dyn ArenaStore>,
    pub puzzles: Arc<MockPuzzleProvider>,
    pub aggregator: Arc<StatsAggregator>,
    pub manager: Arc<MatchManager>,
    pub engine: Arc<MatchingEngine>,
    pub tracker: Arc<PresenceTracker>,
    pub scheduler: Arc<SchedulerDriver>,
}

impl ArenaTestSystem {
    pub fn new() -> Self {
        Self::with_settings(MatchSettings::default(), SchedulerSettings::default())
    }

    pub fn with_settings(
        match_settings: MatchSettings,
        scheduler_settings: SchedulerSettings,
    ) -> Self {
        let store: Arc<dyn ArenaStore> = Arc::new(InMemoryStore::new());

        let calculator = Arc::new(
            EloRatingCalculator::new(EloSettings::default())
                .expect("failed to build rating calculator"),
        );
        let aggregator = Arc::new(StatsAggregator::new(store.clone(), calculator));

        let puzzles = Arc::new(MockPuzzleProvider::new());
        let provider: Arc<dyn PuzzleProvider> = puzzles.clone();

        let manager = Arc::new(MatchManager::new(
            store.clone(),
            provider,
            aggregator.clone(),
            match_settings,
        ));
        let engine = Arc::new(MatchingEngine::new(store.clone(), manager.clone()));
        let tracker = Arc::new(PresenceTracker::new(
            store.clone(),
            PresenceSettings::default(),
        ));
        let scheduler = Arc::new(SchedulerDriver::new(
            engine.clone(),
            manager.clone(),
            tracker.clone(),
            scheduler_settings,
        ));

        Self {
            store,
            puzzles,
            aggregator,
            manager,
            engine,
            tracker,
            scheduler,
        }
    }

    /// Seed a stats record so the player queues with a specific rating
    pub async fn seed_rating(&self, user_id: &str, mode: PvpMode, rating: i32) {
        let mut stats = PvpStats::new(user_id);
        stats.for_mode_mut(mode).rating = rating;
        self.store.upsert_stats(stats).await.unwrap();
    }

    /// Queue a player under a derived display name
    pub async fn join(&self, user_id: &str, mode: PvpMode) -> QueueEntry {
        self.manager
            .join_matchmaking(user_id, &display_name(user_id), mode)
            .await
            .unwrap()
    }

    /// Match id assigned to a user after a pass, if any
    pub async fn assigned_match(&self, user_id: &str, mode: PvpMode) -> Option<String> {
        self.store
            .get_entry(user_id, mode)
            .await
            .unwrap()
            .and_then(|entry| entry.match_id)
    }
}

impl Default for ArenaTestSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn display_name(user_id: &str) -> String {
    let mut chars = user_id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => user_id.to_string(),
    }
}

/// A finished-board result with the given score
pub fn result_with_score(final_score: i64, completed_at: DateTime<Utc>) -> PlayerResult {
    PlayerResult {
        final_score,
        base_points: final_score / 2,
        streak_bonus: final_score / 10,
        time_bonus: final_score / 5,
        completion_bonus: 500,
        max_streak: 6,
        total_moves: 81,
        correct_moves: 78,
        wrong_moves: 3,
        hints_used: 0,
        is_perfect_game: false,
        is_first_finish: false,
        completed_at,
        time_elapsed_ms: 240_000,
        accuracy: 96.3,
    }
}
