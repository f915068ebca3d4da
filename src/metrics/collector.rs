//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the grid-arena matchmaking
//! service using Prometheus metrics.

use crate::matching::MatchPassSummary;
use crate::types::PvpMode;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

fn mode_label(mode: PvpMode) -> &'static str {
    match mode {
        PvpMode::BlindRace => "blind_race",
        PvpMode::LiveBattle => "live_battle",
    }
}

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Match-related metrics
    match_metrics: MatchMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total players queued by mode
    pub players_queued_total: IntCounterVec,

    /// Total players that left the queue before matching, by mode
    pub players_left_total: IntCounterVec,

    /// Players currently waiting by mode
    pub players_waiting: IntGaugeVec,

    /// Total abandoned queue entries removed by cleanup
    pub entries_cleaned_total: IntCounter,
}

/// Match-related metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Total matches created by mode
    pub matches_created_total: IntCounterVec,

    /// Total matches started by mode
    pub matches_started_total: IntCounterVec,

    /// Total matches completed by mode
    pub matches_completed_total: IntCounterVec,

    /// Total matches cancelled by mode
    pub matches_cancelled_total: IntCounterVec,

    /// Matches currently in a non-terminal state
    pub active_matches: IntGauge,

    /// Wall time from match start to completion
    pub match_duration: HistogramVec,

    /// Total moves appended to Live Battle move logs
    pub moves_recorded_total: IntCounter,

    /// Total completed matches folded into player stats
    pub stats_applied_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Matching passes completed
    pub matching_passes_total: IntCounter,

    /// Matching pass duration
    pub matching_pass_duration: Histogram,

    /// Absolute rating gap within created pairs
    pub pair_rating_gap: Histogram,

    /// Pairs whose match creation failed during a pass
    pub pair_failures_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get match metrics
    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a player joining a queue
    pub fn record_queue_join(&self, mode: PvpMode) {
        self.queue_metrics
            .players_queued_total
            .with_label_values(&[mode_label(mode)])
            .inc();
    }

    /// Record a player leaving a queue before being matched
    pub fn record_queue_leave(&self, mode: PvpMode) {
        self.queue_metrics
            .players_left_total
            .with_label_values(&[mode_label(mode)])
            .inc();
    }

    /// Set the number of players currently waiting in one mode
    pub fn set_waiting_players(&self, mode: PvpMode, count: usize) {
        self.queue_metrics
            .players_waiting
            .with_label_values(&[mode_label(mode)])
            .set(count as i64);
    }

    /// Record abandoned queue entries removed by a cleanup sweep
    pub fn record_queue_cleanup(&self, cleaned: usize) {
        self.queue_metrics
            .entries_cleaned_total
            .inc_by(cleaned as u64);
    }

    /// Record a match being created
    pub fn record_match_created(&self, mode: PvpMode) {
        self.match_metrics
            .matches_created_total
            .with_label_values(&[mode_label(mode)])
            .inc();
    }

    /// Record a match starting
    pub fn record_match_started(&self, mode: PvpMode) {
        self.match_metrics
            .matches_started_total
            .with_label_values(&[mode_label(mode)])
            .inc();
    }

    /// Record a match completing
    pub fn record_match_completed(&self, mode: PvpMode) {
        self.match_metrics
            .matches_completed_total
            .with_label_values(&[mode_label(mode)])
            .inc();
    }

    /// Record a match being cancelled
    pub fn record_match_cancelled(&self, mode: PvpMode) {
        self.match_metrics
            .matches_cancelled_total
            .with_label_values(&[mode_label(mode)])
            .inc();
    }

    /// Set the number of matches currently in a non-terminal state
    pub fn set_active_matches(&self, count: usize) {
        self.match_metrics.active_matches.set(count as i64);
    }

    /// Record how long a completed match ran, from start to completion
    pub fn record_match_duration(&self, mode: PvpMode, duration: Duration) {
        self.match_metrics
            .match_duration
            .with_label_values(&[mode_label(mode)])
            .observe(duration.as_secs_f64());
    }

    /// Record the rating gap of a pair committed to a match
    pub fn record_pair_rating_gap(&self, gap: i32) {
        self.performance_metrics.pair_rating_gap.observe(gap as f64);
    }

    /// Record a move appended to a Live Battle move log
    pub fn record_move_recorded(&self) {
        self.match_metrics.moves_recorded_total.inc();
    }

    /// Record a completed match folded into player stats
    pub fn record_stats_applied(&self) {
        self.match_metrics.stats_applied_total.inc();
    }

    /// Record the outcome and duration of one matching pass
    pub fn record_matching_pass(&self, summary: &MatchPassSummary, duration: Duration) {
        self.performance_metrics.matching_passes_total.inc();
        self.performance_metrics
            .matching_pass_duration
            .observe(duration.as_secs_f64());
        if summary.pair_failures > 0 {
            self.performance_metrics
                .pair_failures_total
                .inc_by(summary.pair_failures as u64);
        }
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("grid_arena_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "grid_arena_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("grid_arena_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_queued_total = IntCounterVec::new(
            Opts::new("grid_arena_players_queued_total", "Total players queued"),
            &["mode"],
        )?;
        registry.register(Box::new(players_queued_total.clone()))?;

        let players_left_total = IntCounterVec::new(
            Opts::new(
                "grid_arena_players_left_total",
                "Total players that left the queue before matching",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(players_left_total.clone()))?;

        let players_waiting = IntGaugeVec::new(
            Opts::new(
                "grid_arena_players_waiting",
                "Players currently waiting in queue",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let entries_cleaned_total = IntCounter::new(
            "grid_arena_queue_entries_cleaned_total",
            "Total abandoned queue entries removed",
        )?;
        registry.register(Box::new(entries_cleaned_total.clone()))?;

        Ok(Self {
            players_queued_total,
            players_left_total,
            players_waiting,
            entries_cleaned_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_created_total = IntCounterVec::new(
            Opts::new("grid_arena_matches_created_total", "Total matches created"),
            &["mode"],
        )?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let matches_started_total = IntCounterVec::new(
            Opts::new("grid_arena_matches_started_total", "Total matches started"),
            &["mode"],
        )?;
        registry.register(Box::new(matches_started_total.clone()))?;

        let matches_completed_total = IntCounterVec::new(
            Opts::new(
                "grid_arena_matches_completed_total",
                "Total matches completed",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(matches_completed_total.clone()))?;

        let matches_cancelled_total = IntCounterVec::new(
            Opts::new(
                "grid_arena_matches_cancelled_total",
                "Total matches cancelled",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(matches_cancelled_total.clone()))?;

        let active_matches = IntGauge::new(
            "grid_arena_active_matches",
            "Matches currently in a non-terminal state",
        )?;
        registry.register(Box::new(active_matches.clone()))?;

        let match_duration = HistogramVec::new(
            HistogramOpts::new(
                "grid_arena_match_duration_seconds",
                "Wall time from match start to completion",
            )
            .buckets(vec![30.0, 60.0, 120.0, 300.0, 450.0, 600.0, 900.0]),
            &["mode"],
        )?;
        registry.register(Box::new(match_duration.clone()))?;

        let moves_recorded_total = IntCounter::new(
            "grid_arena_moves_recorded_total",
            "Total moves appended to Live Battle move logs",
        )?;
        registry.register(Box::new(moves_recorded_total.clone()))?;

        let stats_applied_total = IntCounter::new(
            "grid_arena_stats_applied_total",
            "Total completed matches folded into player stats",
        )?;
        registry.register(Box::new(stats_applied_total.clone()))?;

        Ok(Self {
            matches_created_total,
            matches_started_total,
            matches_completed_total,
            matches_cancelled_total,
            active_matches,
            match_duration,
            moves_recorded_total,
            stats_applied_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matching_passes_total = IntCounter::new(
            "grid_arena_matching_passes_total",
            "Matching passes completed",
        )?;
        registry.register(Box::new(matching_passes_total.clone()))?;

        let matching_pass_duration = Histogram::with_opts(
            HistogramOpts::new(
                "grid_arena_matching_pass_duration_seconds",
                "Matching pass duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(matching_pass_duration.clone()))?;

        let pair_rating_gap = Histogram::with_opts(
            HistogramOpts::new(
                "grid_arena_pair_rating_gap",
                "Absolute rating gap within created pairs",
            )
            .buckets(vec![5.0, 10.0, 25.0, 50.0, 100.0, 200.0, 400.0]),
        )?;
        registry.register(Box::new(pair_rating_gap.clone()))?;

        let pair_failures_total = IntCounter::new(
            "grid_arena_pair_failures_total",
            "Pairs whose match creation failed during a pass",
        )?;
        registry.register(Box::new(pair_failures_total.clone()))?;

        Ok(Self {
            matching_passes_total,
            matching_pass_duration,
            pair_rating_gap,
            pair_failures_total,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
