//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the grid-arena
//! matchmaking service, including readiness and liveness probes.

use crate::service::app::AppState;
use crate::store::MatchStore;
use crate::types::PvpMode;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Rolled-up service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version (could be from environment)
    pub version: String,
    /// When the check ran
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Per-component results
    pub checks: Vec<ComponentCheck>,
    /// Counter snapshot reported alongside health
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Failure detail when not healthy
    pub message: Option<String>,
    /// Time the check took, in milliseconds
    pub duration_ms: u64,
}

/// Counter snapshot for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Matches currently in a non-terminal state
    pub active_matches: usize,
    /// Players currently waiting across all queues
    pub players_waiting: usize,
    /// Total matches created since service start
    pub matches_created: u64,
    /// Total players matched since service start
    pub players_matched: u64,
    /// One-line digest of lifecycle counters
    pub counters_summary: String,
}

impl HealthCheck {
    /// Run every component check and fold them into one status
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        // A stopped service is unhealthy no matter what the rest says
        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        // Check the backing store
        let store_check = Self::check_store(&app_state).await;
        if store_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if store_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(store_check);

        // Check the scheduler loops
        let scheduler_check = Self::check_scheduler(&app_state).await;
        if scheduler_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if scheduler_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(scheduler_check);

        let stats = Self::gather_service_stats(&app_state).await;

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: std::env::var("SERVICE_VERSION").unwrap_or_else(|_| "unknown".to_string()),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Liveness probe: the service loop is flagged running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness probe: running and able to answer store queries
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        // The store must answer queries
        match Self::check_store(&app_state).await.status {
            HealthStatus::Healthy => Ok(HealthStatus::Healthy),
            HealthStatus::Degraded => Ok(HealthStatus::Degraded),
            HealthStatus::Unhealthy => Ok(HealthStatus::Unhealthy),
        }
    }

    /// The running flag as a component check
    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service has not been started".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check store health by running a cheap query
    async fn check_store(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.store().count_active_matches().await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Store health check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Store query failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check that the scheduler loops are signalled to run
    async fn check_scheduler(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.scheduler().is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Degraded,
                Some("Scheduler loops are stopped".to_string()),
            )
        };

        ComponentCheck {
            name: "scheduler".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Snapshot the counters reported with every health payload
    async fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let default_stats = ServiceStats {
            active_matches: 0,
            players_waiting: 0,
            matches_created: 0,
            players_matched: 0,
            counters_summary: "Counters unavailable".to_string(),
        };

        let manager_stats = match app_state.manager().get_stats() {
            Ok(stats) => stats,
            Err(e) => {
                debug!("Failed to get manager stats for health check: {}", e);
                return default_stats;
            }
        };
        let engine_stats = match app_state.engine().get_stats() {
            Ok(stats) => stats,
            Err(e) => {
                debug!("Failed to get engine stats for health check: {}", e);
                return default_stats;
            }
        };

        let active_matches = app_state
            .store()
            .count_active_matches()
            .await
            .unwrap_or_default();
        let players_waiting = Self::count_waiting_players(app_state).await;

        ServiceStats {
            active_matches,
            players_waiting,
            matches_created: manager_stats.matches_created,
            players_matched: engine_stats.players_matched,
            counters_summary: format!(
                "Matches completed: {}, cancelled: {}, passes: {}",
                manager_stats.matches_completed,
                manager_stats.matches_cancelled,
                engine_stats.passes_completed
            ),
        }
    }

    async fn count_waiting_players(app_state: &AppState) -> usize {
        use crate::store::QueueStore;

        let mut waiting = 0;
        for mode in PvpMode::ALL {
            if let Ok(entries) = app_state.store().waiting_entries(mode).await {
                waiting += entries.len();
            }
        }
        waiting
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
