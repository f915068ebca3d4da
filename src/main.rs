//! Main entry point for the Grid Arena matchmaking service
//!
//! Boots the full PvP matchmaking stack: configuration, logging, the
//! shared store and scheduler loops, and the health/metrics endpoints,
//! then runs until a shutdown signal arrives.

use anyhow::Result;
use clap::Parser;
use grid_arena::config::{validate_config, AppConfig};
use grid_arena::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Grid Arena Matchmaking Service - PvP sudoku queueing and match lifecycle
#[derive(Parser)]
#[command(
    name = "grid-arena",
    version,
    about = "A matchmaking and match lifecycle service for PvP sudoku duels",
    long_about = "Grid Arena is a Rust-based matchmaking service that pairs queued players \
                 by rating adjacency on a fixed cadence, assigns puzzles, drives each match \
                 through its lifecycle with an append-only move log, tracks presence, and \
                 aggregates per-mode Elo ratings after completion."
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", help = "Path to a TOML configuration file")]
    config: Option<PathBuf>,

    /// One-shot health probe
    #[arg(long, help = "Run a one-shot health check and exit with a status code")]
    health_check: bool,

    /// Logging verbosity override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Log level override (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Health/metrics port override
    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    /// Matching cadence override
    #[arg(
        long,
        value_name = "SECONDS",
        help = "Override the matching pass interval in seconds"
    )]
    matching_interval: Option<u64>,

    /// Verbose debug logging
    #[arg(short, long, help = "Turn on verbose debug logging")]
    debug: bool,

    /// Validate configuration without serving
    #[arg(long, help = "Validate configuration and exit without serving")]
    dry_run: bool,
}

/// Install the global tracing subscriber
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Logging setup failed: {}", e))?;

    Ok(())
}

/// One-shot health check with a process exit code for probes
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Running health check...");

    let app_state = Arc::new(AppState::new(config).await?);

    match HealthCheck::check(app_state).await {
        Ok(health) => {
            println!("Service health: {}", health.status);
            println!("  Active matches:  {}", health.stats.active_matches);
            println!("  Matches created: {}", health.stats.matches_created);
            println!("  Players waiting: {}", health.stats.players_waiting);
            println!("  Players matched: {}", health.stats.players_matched);
            println!("  Counters:        {}", health.stats.counters_summary);

            if health.status == HealthStatus::Healthy {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Block until SIGINT or SIGTERM arrives
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to register Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("SIGINT received");
        },
        _ = terminate => {
            info!("SIGTERM received");
        },
    }
}

/// Log a service health summary on a fixed cadence
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while app_state.is_running().await {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} active matches, {} players waiting",
                    health.status, health.stats.active_matches, health.stats.players_waiting
                );
            }
            Err(e) => {
                warn!("Periodic health check failed: {}", e);
            }
        }
    }
}

/// Print the startup banner
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Grid Arena Matchmaking Service");
    info!("   Service name: {}", config.service.name);
    info!("   Logging: {}", config.service.log_level);
    info!("   Health/metrics port: {}", config.service.health_port);
    info!(
        "   Matching interval: {}s",
        config.scheduler.matching_interval_seconds
    );
    info!(
        "   Live battle duration: {}s",
        config.matches.live_battle_duration_seconds
    );
    info!(
        "   Queue staleness cutoff: {}s",
        config.scheduler.queue_staleness_seconds
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load configuration and apply CLI overrides on top
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration file: {}", config_path.display());
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    if let Some(matching_interval) = args.matching_interval {
        config.scheduler.matching_interval_seconds = matching_interval;
    }

    validate_config(&config)?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration must be resolved before logging is installed
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Logging setup failed: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validated");
        display_startup_banner(&config);
        info!("Dry run complete, not starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing matchmaking components...");
    let app_state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Service initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting matchmaking service...");
    if let Err(e) = app_state.start().await {
        error!("Service startup failed: {}", e);
        std::process::exit(1);
    }

    // Periodic health summary alongside the scheduler loops
    let health_task = {
        let app_state = app_state.clone();
        tokio::spawn(async move {
            health_check_task(app_state).await;
        })
    };

    info!("✅ Grid Arena Matchmaking Service is running");
    info!("Press Ctrl+C to stop");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, draining service...");

    health_task.abort();

    // Shutdown is bounded so a stuck loop cannot hold the process open
    let shutdown_timeout = config.shutdown_timeout();
    match tokio::time::timeout(shutdown_timeout, app_state.shutdown()).await {
        Ok(Ok(())) => {
            info!("✅ Graceful shutdown complete");
        }
        Ok(Err(e)) => {
            warn!("Shutdown completed with errors: {}", e);
        }
        Err(_) => {
            warn!("⚠️  Shutdown deadline exceeded, exiting anyway");
        }
    }

    info!("🛑 Grid Arena Matchmaking Service stopped");
    Ok(())
}
