//! Main application configuration
//!
//! This module defines the primary configuration structures for the arena
//! service, including environment variable loading, TOML file loading and
//! validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub scheduler: SchedulerSettings,
    pub matches: MatchSettings,
    pub presence: PresenceSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health, metrics and admin endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Cadences for the periodic background work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Matching pass interval in seconds
    pub matching_interval_seconds: u64,
    /// Queue cleanup sweep interval in seconds
    pub cleanup_interval_seconds: u64,
    /// Age after which a waiting queue entry is considered abandoned, in seconds
    pub queue_staleness_seconds: u64,
    /// Deadline sweep interval in seconds
    pub deadline_sweep_interval_seconds: u64,
    /// Presence staleness sweep interval in seconds
    pub presence_sweep_interval_seconds: u64,
}

/// Match rule settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Hard time limit for Live Battle matches in seconds
    pub live_battle_duration_seconds: u64,
}

/// Presence and heartbeat settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    /// Cadence clients are expected to heartbeat at, in seconds
    pub heartbeat_interval_seconds: u64,
    /// Silence after which an online record counts as disconnected, in seconds
    pub liveness_window_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "grid-arena".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            matching_interval_seconds: 5,
            cleanup_interval_seconds: 600,  // 10 minutes
            queue_staleness_seconds: 1800,  // 30 minutes
            deadline_sweep_interval_seconds: 30,
            presence_sweep_interval_seconds: 5,
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            live_battle_duration_seconds: 600, // 10 minutes
        }
    }
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: 5,
            liveness_window_seconds: 15, // three missed heartbeats
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            config.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Scheduler settings
        if let Ok(interval) = env::var("MATCHING_INTERVAL_SECONDS") {
            config.scheduler.matching_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid MATCHING_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(cleanup) = env::var("CLEANUP_INTERVAL_SECONDS") {
            config.scheduler.cleanup_interval_seconds = cleanup
                .parse()
                .map_err(|_| anyhow!("Invalid CLEANUP_INTERVAL_SECONDS value: {}", cleanup))?;
        }
        if let Ok(staleness) = env::var("QUEUE_STALENESS_SECONDS") {
            config.scheduler.queue_staleness_seconds = staleness
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_STALENESS_SECONDS value: {}", staleness))?;
        }
        if let Ok(interval) = env::var("DEADLINE_SWEEP_INTERVAL_SECONDS") {
            config.scheduler.deadline_sweep_interval_seconds = interval.parse().map_err(|_| {
                anyhow!("Invalid DEADLINE_SWEEP_INTERVAL_SECONDS value: {}", interval)
            })?;
        }
        if let Ok(interval) = env::var("PRESENCE_SWEEP_INTERVAL_SECONDS") {
            config.scheduler.presence_sweep_interval_seconds = interval.parse().map_err(|_| {
                anyhow!("Invalid PRESENCE_SWEEP_INTERVAL_SECONDS value: {}", interval)
            })?;
        }

        // Match settings
        if let Ok(duration) = env::var("LIVE_BATTLE_DURATION_SECONDS") {
            config.matches.live_battle_duration_seconds = duration
                .parse()
                .map_err(|_| anyhow!("Invalid LIVE_BATTLE_DURATION_SECONDS value: {}", duration))?;
        }

        // Presence settings
        if let Ok(interval) = env::var("HEARTBEAT_INTERVAL_SECONDS") {
            config.presence.heartbeat_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid HEARTBEAT_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(window) = env::var("PRESENCE_LIVENESS_WINDOW_SECONDS") {
            config.presence.liveness_window_seconds = window.parse().map_err(|_| {
                anyhow!("Invalid PRESENCE_LIVENESS_WINDOW_SECONDS value: {}", window)
            })?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse TOML configuration")?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get matching pass interval as Duration
    pub fn matching_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.matching_interval_seconds)
    }

    /// Get cleanup sweep interval as Duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.cleanup_interval_seconds)
    }

    /// Get deadline sweep interval as Duration
    pub fn deadline_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.deadline_sweep_interval_seconds)
    }

    /// Get presence sweep interval as Duration
    pub fn presence_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.presence_sweep_interval_seconds)
    }

    /// Get expected heartbeat cadence as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.presence.heartbeat_interval_seconds)
    }

    /// Get queue entry staleness threshold as a chrono Duration
    pub fn queue_staleness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.scheduler.queue_staleness_seconds as i64)
    }

    /// Get the Live Battle time limit as a chrono Duration
    pub fn live_battle_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.matches.live_battle_duration_seconds as i64)
    }

    /// Get the presence liveness window as a chrono Duration
    pub fn liveness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.presence.liveness_window_seconds as i64)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate scheduler settings
    if config.scheduler.matching_interval_seconds == 0 {
        return Err(anyhow!("Matching interval must be greater than 0"));
    }
    if config.scheduler.cleanup_interval_seconds == 0 {
        return Err(anyhow!("Cleanup interval must be greater than 0"));
    }
    if config.scheduler.queue_staleness_seconds == 0 {
        return Err(anyhow!("Queue staleness threshold must be greater than 0"));
    }
    if config.scheduler.deadline_sweep_interval_seconds == 0 {
        return Err(anyhow!("Deadline sweep interval must be greater than 0"));
    }
    if config.scheduler.presence_sweep_interval_seconds == 0 {
        return Err(anyhow!("Presence sweep interval must be greater than 0"));
    }

    // Validate match settings
    if config.matches.live_battle_duration_seconds == 0 {
        return Err(anyhow!("Live Battle duration must be greater than 0"));
    }

    // Validate presence settings
    if config.presence.heartbeat_interval_seconds == 0 {
        return Err(anyhow!("Heartbeat interval must be greater than 0"));
    }
    if config.presence.liveness_window_seconds < config.presence.heartbeat_interval_seconds {
        return Err(anyhow!(
            "Liveness window must be at least one heartbeat interval"
        ));
    }

    Ok(())
}
