//! Main application state and service coordination
//!
//! This module contains the production AppState that coordinates the store,
//! match manager, matching engine, presence tracker, scheduler and the
//! metrics service.

use crate::config::AppConfig;
use crate::lifecycle::MatchManager;
use crate::matching::MatchingEngine;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::presence::PresenceTracker;
use crate::puzzle::{PuzzleProvider, StaticPuzzleProvider};
use crate::rating::{EloRatingCalculator, EloSettings};
use crate::scheduler::SchedulerDriver;
use crate::stats::StatsAggregator;
use crate::store::memory::InMemoryStore;
use crate::store::{ArenaStore, MatchStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Backing store shared by every component
    store: Arc<dyn ArenaStore>,

    /// Queue and match lifecycle manager
    manager: Arc<MatchManager>,

    /// Periodic matching engine
    engine: Arc<MatchingEngine>,

    /// Presence tracker
    tracker: Arc<PresenceTracker>,

    /// Stats aggregator
    aggregator: Arc<StatsAggregator>,

    /// Scheduler driving the periodic sweeps
    scheduler: Arc<SchedulerDriver>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing grid-arena matchmaking service");
        info!(
            "Configuration: service={}, health_port={}",
            config.service.name, config.service.health_port
        );

        let metrics_service = Self::initialize_metrics(&config)?;

        let store: Arc<dyn ArenaStore> = Arc::new(InMemoryStore::new());

        let (manager, engine, tracker, aggregator, scheduler) =
            Self::initialize_matchmaking_system(&config, store.clone(), metrics_service.collector())?;

        Ok(Self {
            config,
            store,
            manager,
            engine,
            tracker,
            aggregator,
            scheduler,
            metrics_service,
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start all background services
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting grid-arena matchmaking service");

        // Mark as running
        *self.is_running.write().await = true;

        // Hand the health endpoints a view of the running service
        self.metrics_service
            .health_server()
            .set_app_state(self.clone())
            .await;

        // Start metrics service first
        self.start_metrics_service().await?;

        // Start the periodic sweeps
        let scheduler_handles = self.scheduler.start().await;
        {
            let mut tasks = self.background_tasks.lock().await;
            tasks.extend(scheduler_handles);
        }

        // Start health metrics updates
        self.start_health_metrics_task().await;

        info!("✅ Grid-arena matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of grid-arena service");

        // Mark as not running
        *self.is_running.write().await = false;
        self.scheduler.stop().await;

        // Stop background tasks (including metrics service task)
        self.stop_background_tasks().await;

        // Stop metrics service
        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        // Get final statistics
        let final_stats =
            self.manager
                .get_stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Grid-arena service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the backing store
    pub fn store(&self) -> Arc<dyn ArenaStore> {
        self.store.clone()
    }

    /// Get the match manager for operations
    pub fn manager(&self) -> Arc<MatchManager> {
        self.manager.clone()
    }

    /// Get the matching engine
    pub fn engine(&self) -> Arc<MatchingEngine> {
        self.engine.clone()
    }

    /// Get the presence tracker
    pub fn tracker(&self) -> Arc<PresenceTracker> {
        self.tracker.clone()
    }

    /// Get the stats aggregator
    pub fn aggregator(&self) -> Arc<StatsAggregator> {
        self.aggregator.clone()
    }

    /// Get the scheduler driver
    pub fn scheduler(&self) -> Arc<SchedulerDriver> {
        self.scheduler.clone()
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Initialize metrics service
    fn initialize_metrics(config: &AppConfig) -> Result<Arc<MetricsService>, ServiceError> {
        info!(
            "Initializing metrics service on port {}",
            config.service.health_port
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server = Arc::new(HealthServer::new(health_config, metrics_collector.clone()));
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(metrics_service)
    }

    /// Initialize the complete matchmaking system
    fn initialize_matchmaking_system(
        config: &AppConfig,
        store: Arc<dyn ArenaStore>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<
        (
            Arc<MatchManager>,
            Arc<MatchingEngine>,
            Arc<PresenceTracker>,
            Arc<StatsAggregator>,
            Arc<SchedulerDriver>,
        ),
        ServiceError,
    > {
        info!("Initializing matchmaking system components");

        let calculator = Arc::new(EloRatingCalculator::new(EloSettings::default()).map_err(
            |e| ServiceError::Initialization {
                message: format!("Failed to initialize rating calculator: {}", e),
            },
        )?);
        let aggregator = Arc::new(StatsAggregator::with_metrics(
            store.clone(),
            calculator,
            metrics_collector.clone(),
        ));

        let puzzles: Arc<dyn PuzzleProvider> = Arc::new(StaticPuzzleProvider::new());

        let manager = Arc::new(MatchManager::with_metrics(
            store.clone(),
            puzzles,
            aggregator.clone(),
            config.matches.clone(),
            metrics_collector.clone(),
        ));

        let engine = Arc::new(MatchingEngine::with_metrics(
            store.clone(),
            manager.clone(),
            metrics_collector,
        ));

        let tracker = Arc::new(PresenceTracker::new(store, config.presence.clone()));

        let scheduler = Arc::new(SchedulerDriver::new(
            engine.clone(),
            manager.clone(),
            tracker.clone(),
            config.scheduler.clone(),
        ));

        Ok((manager, engine, tracker, aggregator, scheduler))
    }

    /// Start metrics service
    async fn start_metrics_service(&self) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        self.background_tasks.lock().await.push(metrics_handle);

        // Give the server a moment to start up
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Start the periodic health metrics update task
    async fn start_health_metrics_task(&self) {
        info!("Starting health metrics task (60s interval)...");

        let metrics_collector = self.metrics_service.collector();
        let store = self.store.clone();
        let scheduler = self.scheduler.clone();
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            let start_time = tokio::time::Instant::now();
            info!("Health metrics task started");

            while *is_running.read().await {
                interval.tick().await;

                let uptime_seconds = start_time.elapsed().as_secs() as i64;
                metrics_collector
                    .service()
                    .uptime_seconds
                    .set(uptime_seconds);

                match store.count_active_matches().await {
                    Ok(count) => {
                        metrics_collector.set_active_matches(count);
                        metrics_collector.update_component_health("store", true);
                    }
                    Err(e) => {
                        warn!("Failed to count active matches for metrics: {}", e);
                        metrics_collector.update_component_health("store", false);
                    }
                }
                metrics_collector.update_component_health("scheduler", scheduler.is_running().await);
                metrics_collector.update_health_status(2);

                debug!(
                    "Updated service health metrics - uptime: {}s",
                    uptime_seconds
                );
            }

            info!("Health metrics task stopped");
        });

        self.background_tasks.lock().await.push(handle);
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        // Give tasks time to clean up gracefully
        info!("Waiting for background tasks to complete shutdown...");
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        info!("✅ All {} background tasks stopped", task_count);
    }
}
