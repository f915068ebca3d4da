//! Metrics and monitoring for the grid-arena matchmaking service
//!
//! This module provides metrics collection, health monitoring and the HTTP
//! endpoints that expose them.

pub mod collector;
pub mod health;

pub use collector::{
    MatchMetrics, MetricsCollector, PerformanceMetrics, QueueMetrics, ServiceMetrics,
};
pub use health::{HealthEndpoints, HealthServer, HealthServerConfig};

use std::sync::Arc;
use tracing::info;

/// Facade over the metrics collector and the HTTP server exposing it
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
}

impl MetricsService {
    pub fn new(collector: Arc<MetricsCollector>, health_server: Arc<HealthServer>) -> Self {
        Self {
            collector,
            health_server,
        }
    }

    /// The collector shared with every recording component
    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// The HTTP server serving health and metrics endpoints
    pub fn health_server(&self) -> Arc<HealthServer> {
        self.health_server.clone()
    }

    /// Serve the health and metrics endpoints until stopped
    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Serving health and metrics endpoints");
        self.health_server.start().await
    }

    /// Signal the endpoint server to shut down
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }
}
