//! Matching engine that turns waiting queues into matches
//!
//! This module provides the periodic matching pass: snapshot each mode's
//! waiting queue, pair entries by rating adjacency, and create a match per
//! pair. Creation is atomic per pair, so a failed pair leaves both of its
//! entries waiting for the next pass while the rest of the pass continues.

use crate::error::{MatchmakingError, Result};
use crate::lifecycle::manager::MatchManager;
use crate::matching::pairing::{AdjacentRatingPairer, PairingStrategy};
use crate::metrics::MetricsCollector;
use crate::store::{ArenaStore, QueueStore};
use crate::types::PvpMode;
use crate::utils::rating_difference;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};

/// Summary of a single matching pass
#[derive(Debug, Clone, Default)]
pub struct MatchPassSummary {
    /// Waiting entries examined across all modes
    pub examined: usize,
    /// Matches created this pass
    pub matches_created: usize,
    /// Players placed into matches this pass
    pub players_matched: usize,
    /// Players left waiting for a future pass
    pub left_waiting: usize,
    /// Pairs whose match creation failed
    pub pair_failures: usize,
}

/// Cumulative statistics about engine operations
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Total matching passes completed
    pub passes_completed: u64,
    /// Total matches created
    pub matches_created: u64,
    /// Total players placed into matches
    pub players_matched: u64,
    /// Total pair creation failures
    pub pair_failures: u64,
    /// When the most recent pass finished
    pub last_pass_at: Option<DateTime<Utc>>,
}

/// The matching engine
#[derive(Clone)]
pub struct MatchingEngine {
    /// Backing store for queue snapshots
    store: Arc<dyn ArenaStore>,
    /// Match manager that owns creation semantics
    manager: Arc<MatchManager>,
    /// Pairing algorithm for queue snapshots
    pairing: Arc<dyn PairingStrategy>,
    /// Engine statistics
    stats: Arc<RwLock<EngineStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchingEngine {
    /// Create a new matching engine with the default pairer
    pub fn new(store: Arc<dyn ArenaStore>, manager: Arc<MatchManager>) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_pairing(
            store,
            manager,
            Arc::new(AdjacentRatingPairer::new()),
            metrics_collector,
        )
    }

    /// Create a new matching engine with an explicit metrics collector
    pub fn with_metrics(
        store: Arc<dyn ArenaStore>,
        manager: Arc<MatchManager>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self::with_pairing(
            store,
            manager,
            Arc::new(AdjacentRatingPairer::new()),
            metrics_collector,
        )
    }

    /// Create with a custom pairing strategy and metrics collector
    pub fn with_pairing(
        store: Arc<dyn ArenaStore>,
        manager: Arc<MatchManager>,
        pairing: Arc<dyn PairingStrategy>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            manager,
            pairing,
            stats: Arc::new(RwLock::new(EngineStats::default())),
            metrics_collector,
        }
    }

    /// Run one matching pass over every mode
    ///
    /// A queue snapshot failure aborts the pass; a single pair failing to
    /// become a match does not.
    pub async fn run_pass(&self) -> Result<MatchPassSummary> {
        let start_time = Instant::now();
        let mut summary = MatchPassSummary::default();

        for mode in PvpMode::ALL {
            let waiting = self.store.waiting_entries(mode).await?;
            summary.examined += waiting.len();

            if waiting.len() < 2 {
                summary.left_waiting += waiting.len();
                self.metrics_collector
                    .set_waiting_players(mode, waiting.len());
                continue;
            }

            info!(
                "Pairing {} queue - waiting: {}, pass_total_examined: {}",
                mode,
                waiting.len(),
                summary.examined
            );

            let outcome = self.pairing.pair_entries(waiting);
            summary.left_waiting += outcome.unpaired.len();
            self.metrics_collector
                .set_waiting_players(mode, outcome.unpaired.len());

            for (first, second) in &outcome.pairs {
                match self.manager.create_match_for_pair(mode, first, second).await {
                    Ok(created) => {
                        summary.matches_created += 1;
                        summary.players_matched += 2;
                        let gap = rating_difference(first.rating, second.rating);
                        self.metrics_collector.record_pair_rating_gap(gap);
                        info!(
                            "Created {} match {} - '{}' ({}) vs '{}' ({}), rating gap: {}",
                            mode,
                            created.match_id,
                            first.user_id,
                            first.rating,
                            second.user_id,
                            second.rating,
                            gap
                        );
                    }
                    Err(e) => {
                        // Both entries stay waiting and are re-examined next pass
                        summary.pair_failures += 1;
                        warn!(
                            "Failed to create {} match for '{}' vs '{}': {}",
                            mode, first.user_id, second.user_id, e
                        );
                    }
                }
            }
        }

        let duration = start_time.elapsed();
        self.record_pass(&summary)?;
        self.metrics_collector
            .record_matching_pass(&summary, duration);

        info!(
            "Matching pass complete - examined: {}, created: {}, matched: {}, waiting: {}, failures: {}, duration: {:.2}ms",
            summary.examined,
            summary.matches_created,
            summary.players_matched,
            summary.left_waiting,
            summary.pair_failures,
            duration.as_secs_f64() * 1000.0
        );

        Ok(summary)
    }

    /// Get cumulative engine statistics
    pub fn get_stats(&self) -> Result<EngineStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire engine stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }

    fn record_pass(&self, summary: &MatchPassSummary) -> Result<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire engine stats lock".to_string(),
            })?;

        stats.passes_completed += 1;
        stats.matches_created += summary.matches_created as u64;
        stats.players_matched += summary.players_matched as u64;
        stats.pair_failures += summary.pair_failures as u64;
        stats.last_pass_at = Some(Utc::now());

        Ok(())
    }
}
