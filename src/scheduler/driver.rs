//! Periodic background work
//!
//! Drives the four recurring sweeps of the service: matching passes, stale
//! queue cleanup, Live Battle deadline enforcement, and presence staleness.
//! Every sweep owner does its own logging; the driver only reports cadence
//! and failures.

use crate::config::SchedulerSettings;
use crate::error::Result;
use crate::lifecycle::MatchManager;
use crate::matching::{MatchPassSummary, MatchingEngine};
use crate::presence::PresenceTracker;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Drives the periodic matching, cleanup, deadline and presence sweeps
pub struct SchedulerDriver {
    /// Matching engine run on every matching tick
    engine: Arc<MatchingEngine>,
    /// Match manager for cleanup and deadline sweeps
    manager: Arc<MatchManager>,
    /// Presence tracker for staleness sweeps
    tracker: Arc<PresenceTracker>,
    /// Sweep cadences
    settings: SchedulerSettings,
    /// Running flag shared with every spawned loop
    is_running: Arc<RwLock<bool>>,
}

impl SchedulerDriver {
    /// Create a new scheduler driver
    pub fn new(
        engine: Arc<MatchingEngine>,
        manager: Arc<MatchManager>,
        tracker: Arc<PresenceTracker>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            engine,
            manager,
            tracker,
            settings,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Spawn all periodic loops and return their handles
    ///
    /// Loops run until [`SchedulerDriver::stop`] flips the running flag;
    /// each loop notices at its next tick.
    pub async fn start(&self) -> Vec<JoinHandle<()>> {
        *self.is_running.write().await = true;

        info!(
            "Starting scheduler - matching: {}s, cleanup: {}s, deadline: {}s, presence: {}s",
            self.settings.matching_interval_seconds,
            self.settings.cleanup_interval_seconds,
            self.settings.deadline_sweep_interval_seconds,
            self.settings.presence_sweep_interval_seconds
        );

        let matching_task = {
            let engine = self.engine.clone();
            let interval_seconds = self.settings.matching_interval_seconds;
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
                info!("Matching task started");

                while *is_running.read().await {
                    interval.tick().await;

                    if let Err(e) = engine.run_pass().await {
                        error!("Matching pass failed: {}", e);
                    }
                }

                info!("Matching task stopped");
            })
        };

        let cleanup_task = {
            let manager = self.manager.clone();
            let interval_seconds = self.settings.cleanup_interval_seconds;
            let staleness = chrono::Duration::seconds(self.settings.queue_staleness_seconds as i64);
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
                info!("Queue cleanup task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match manager.cleanup_stale_queue_entries(Utc::now() - staleness).await {
                        Ok(0) => debug!("Cleanup check completed - no stale queue entries"),
                        Ok(_) => {}
                        Err(e) => warn!("Queue cleanup failed: {}", e),
                    }
                }

                info!("Queue cleanup task stopped");
            })
        };

        let deadline_task = {
            let manager = self.manager.clone();
            let interval_seconds = self.settings.deadline_sweep_interval_seconds;
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
                info!("Deadline sweep task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match manager.force_end_overdue(Utc::now()).await {
                        Ok(0) => debug!("Deadline check completed - no overdue matches"),
                        Ok(_) => {}
                        Err(e) => warn!("Deadline sweep failed: {}", e),
                    }
                }

                info!("Deadline sweep task stopped");
            })
        };

        let presence_task = {
            let tracker = self.tracker.clone();
            let interval_seconds = self.settings.presence_sweep_interval_seconds;
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
                info!("Presence sweep task started");

                while *is_running.read().await {
                    interval.tick().await;

                    if let Err(e) = tracker.sweep_stale(Utc::now()).await {
                        warn!("Presence sweep failed: {}", e);
                    }
                }

                info!("Presence sweep task stopped");
            })
        };

        vec![matching_task, cleanup_task, deadline_task, presence_task]
    }

    /// Signal every loop to exit at its next tick
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        info!("Scheduler stop requested");
    }

    /// Check whether the loops are signalled to run
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Run one matching pass immediately, outside the periodic cadence
    pub async fn trigger_matching(&self) -> Result<MatchPassSummary> {
        info!("Manually triggered matching pass");
        self.engine.run_pass().await
    }
}
