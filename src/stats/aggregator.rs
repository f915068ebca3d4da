//! Stats aggregation for completed matches
//!
//! Folds each completed match into both players' persistent stats exactly
//! once: game counters, rolling averages, and the rating exchange computed
//! by the configured rating calculator.

use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::RatingCalculator;
use crate::store::{ArenaStore, MatchStore, StatsStore};
use crate::types::{MatchOutcome, MatchStatus, PvpStats};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Statistics about stats aggregation operations
#[derive(Debug, Clone, Default)]
pub struct AggregatorStats {
    /// Matches folded into player stats by this instance
    pub matches_applied: u64,
    /// Apply requests skipped because the match was already claimed
    pub matches_skipped: u64,
}

/// Applies completed matches to persistent player stats
pub struct StatsAggregator {
    /// Backing store for match records and player stats
    store: Arc<dyn ArenaStore>,
    /// Rating calculator deciding the points exchanged per match
    calculator: Arc<dyn RatingCalculator>,
    /// Aggregator statistics
    stats: Arc<RwLock<AggregatorStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl StatsAggregator {
    /// Create a new stats aggregator
    pub fn new(store: Arc<dyn ArenaStore>, calculator: Arc<dyn RatingCalculator>) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(store, calculator, metrics_collector)
    }

    /// Create a new stats aggregator with an explicit metrics collector
    pub fn with_metrics(
        store: Arc<dyn ArenaStore>,
        calculator: Arc<dyn RatingCalculator>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            calculator,
            stats: Arc::new(RwLock::new(AggregatorStats::default())),
            metrics_collector,
        }
    }

    /// Fold a completed match into both players' stats, at most once
    ///
    /// The match record itself carries the claim: the first caller flips
    /// `stats_applied` and performs the aggregation, every later call
    /// returns `Ok(false)` without touching anything. Only completed
    /// matches are eligible; cancelled matches never reach player stats.
    ///
    /// The claim is taken before the rating write, so a storage failure
    /// after the claim drops this application instead of risking a double
    /// count on retry.
    pub async fn apply_match(&self, match_id: &str) -> Result<bool> {
        let (record, claimed) = self
            .store
            .update_match(
                match_id,
                Box::new(|m| {
                    if m.status != MatchStatus::Completed {
                        return Err(MatchmakingError::InvalidTransition {
                            reason: format!(
                                "match {} is {} and not eligible for stats",
                                m.match_id, m.status
                            ),
                        }
                        .into());
                    }
                    if m.stats_applied {
                        return Ok(false);
                    }
                    m.stats_applied = true;
                    Ok(true)
                }),
            )
            .await?;

        if !claimed {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire aggregator stats lock".to_string(),
                })?;
            stats.matches_skipped += 1;
            return Ok(false);
        }

        // Stable order keeps logs and the rating exchange deterministic
        let mut seated: Vec<_> = record.players.values().cloned().collect();
        seated.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        let (first, second) = match seated.as_slice() {
            [first, second] => (first.clone(), second.clone()),
            _ => {
                warn!(
                    "Match {} completed with {} players, skipping stats",
                    match_id,
                    record.player_count()
                );
                return Ok(false);
            }
        };

        // Both reads happen before either write so the exchange is computed
        // from pre-match ratings even when a player faces themselves twice
        // in quick succession.
        let mut first_stats = self
            .store
            .get_stats(&first.user_id)
            .await?
            .unwrap_or_else(|| PvpStats::new(first.user_id.clone()));
        let mut second_stats = self
            .store
            .get_stats(&second.user_id)
            .await?
            .unwrap_or_else(|| PvpStats::new(second.user_id.clone()));

        let first_outcome = MatchOutcome::for_player(record.winner_id.as_deref(), &first.user_id);
        let second_outcome = MatchOutcome::for_player(record.winner_id.as_deref(), &second.user_id);

        let (first_update, second_update) = self.calculator.rate_pair(
            (&first.user_id, first_stats.for_mode(record.mode).rating),
            (&second.user_id, second_stats.for_mode(record.mode).rating),
            first_outcome,
        )?;

        {
            let mode_stats = first_stats.for_mode_mut(record.mode);
            mode_stats.apply_game(first_outcome, first.result.as_ref());
            mode_stats.rating = first_update.new_rating;
        }
        {
            let mode_stats = second_stats.for_mode_mut(record.mode);
            mode_stats.apply_game(second_outcome, second.result.as_ref());
            mode_stats.rating = second_update.new_rating;
        }

        self.store.upsert_stats(first_stats).await?;
        self.store.upsert_stats(second_stats).await?;

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire aggregator stats lock".to_string(),
                })?;
            stats.matches_applied += 1;
        }
        self.metrics_collector.record_stats_applied();

        info!(
            "Applied stats for {} match {} - '{}': {} ({:+}), '{}': {} ({:+})",
            record.mode,
            match_id,
            first_update.user_id,
            first_update.new_rating,
            first_update.delta(),
            second_update.user_id,
            second_update.new_rating,
            second_update.delta()
        );

        Ok(true)
    }

    /// Get current aggregator statistics
    pub fn get_stats(&self) -> Result<AggregatorStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire aggregator stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }

    /// Describe the rating calculator configuration
    pub fn calculator_config(&self) -> serde_json::Value {
        self.calculator.config()
    }
}
