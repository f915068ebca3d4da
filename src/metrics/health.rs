//! Health check endpoints and Prometheus metrics server
//!
//! This module provides HTTP endpoints for health checks, Prometheus metrics
//! and manual operations for the grid-arena matchmaking service using Axum.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
///
/// The application state is attached after startup, once the service
/// components exist. Endpoints that need it answer 503 until then.
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub app_state: Arc<RwLock<Option<Arc<AppState>>>>,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                app_state: Arc::new(RwLock::new(None)),
            },
            shutdown_tx,
        }
    }

    /// Attach the application state for full health checks
    pub async fn set_app_state(&self, app_state: Arc<AppState>) {
        *self.state.app_state.write().await = Some(app_state);
        info!("Health server attached to application state");
    }

    /// Start the health server
    pub async fn start(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Starting health server on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", addr))?;

        let router = self.create_router();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("✅ Health server listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server received shutdown signal");
            })
            .await
            .context("Health server error")?;

        info!("Health server stopped");
        Ok(())
    }

    /// Signal the server to shut down
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server");
        let _ = self.shutdown_tx.send(());
        Ok(())
    }

    /// Create the router with all endpoints
    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .route("/matchmaking/run", post(trigger_matching_handler))
            .with_state(self.state.clone())
    }
}

/// Root endpoint with service information
async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "grid-arena",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "PvP matchmaking and match lifecycle service",
        "endpoints": {
            "health": "/health",
            "readiness": "/ready",
            "liveness": "/alive",
            "metrics": "/metrics",
            "stats": "/stats",
            "trigger_matching": "POST /matchmaking/run"
        }
    }))
}

/// Comprehensive health check endpoint
async fn health_handler(State(state): State<HealthServerState>) -> Response {
    let app_state = state.app_state.read().await.clone();
    match app_state {
        Some(app) => match HealthCheck::check(app).await {
            Ok(health) => {
                let status_code = match health.status {
                    HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
                    HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status_code, Json(health)).into_response()
            }
            Err(e) => {
                error!("Health check failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "status": "error",
                        "message": format!("Health check failed: {}", e)
                    })),
                )
                    .into_response()
            }
        },
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unavailable",
                "message": "Service state not initialized"
            })),
        )
            .into_response(),
    }
}

/// Kubernetes-style readiness probe
async fn ready_handler(State(state): State<HealthServerState>) -> Response {
    let app_state = state.app_state.read().await.clone();
    match app_state {
        Some(app) => match HealthCheck::readiness_check(app).await {
            Ok(HealthStatus::Healthy) => {
                (StatusCode::OK, Json(json!({"status": "ready"}))).into_response()
            }
            Ok(status) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "not_ready", "detail": status.to_string()})),
            )
                .into_response(),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({"status": "not_ready"})),
                )
                    .into_response()
            }
        },
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready", "detail": "Service state not initialized"})),
        )
            .into_response(),
    }
}

/// Kubernetes-style liveness probe
async fn alive_handler(State(state): State<HealthServerState>) -> Response {
    let app_state = state.app_state.read().await.clone();
    match app_state {
        Some(app) => match HealthCheck::liveness_check(app).await {
            Ok(HealthStatus::Healthy) => {
                (StatusCode::OK, Json(json!({"status": "alive"}))).into_response()
            }
            _ => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "not_alive"})),
            )
                .into_response(),
        },
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_alive", "detail": "Service state not initialized"})),
        )
            .into_response(),
    }
}

/// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics_collector.registry().gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(output) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", encoder.format_type())
            .body(output.into())
            .unwrap(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Service statistics endpoint
async fn stats_handler(State(state): State<HealthServerState>) -> Response {
    let app_state = state.app_state.read().await.clone();
    match app_state {
        Some(app) => match HealthCheck::check(app).await {
            Ok(health) => (
                StatusCode::OK,
                Json(json!({
                    "service": {
                        "name": "grid-arena",
                        "version": env!("CARGO_PKG_VERSION"),
                        "status": health.status,
                        "counters": health.stats.counters_summary,
                    },
                    "matches": {
                        "active": health.stats.active_matches,
                        "created": health.stats.matches_created,
                    },
                    "players": {
                        "waiting": health.stats.players_waiting,
                        "matched": health.stats.players_matched,
                    },
                    "components": health.checks,
                    "timestamp": health.timestamp,
                })),
            )
                .into_response(),
            Err(e) => {
                error!("Stats collection failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": format!("Stats collection failed: {}", e)})),
                )
                    .into_response()
            }
        },
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "Service state not initialized"})),
        )
            .into_response(),
    }
}

/// Manually trigger a matching pass outside the scheduler cadence
async fn trigger_matching_handler(State(state): State<HealthServerState>) -> Response {
    let app_state = state.app_state.read().await.clone();
    match app_state {
        Some(app) => match app.scheduler().trigger_matching().await {
            Ok(summary) => (
                StatusCode::OK,
                Json(json!({
                    "examined": summary.examined,
                    "matches_created": summary.matches_created,
                    "players_matched": summary.players_matched,
                    "left_waiting": summary.left_waiting,
                    "pair_failures": summary.pair_failures,
                })),
            )
                .into_response(),
            Err(e) => {
                error!("Manually triggered matching pass failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": format!("Matching pass failed: {}", e)})),
                )
                    .into_response()
            }
        },
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "Service state not initialized"})),
        )
            .into_response(),
    }
}

/// Programmatic access to the health endpoints for tooling
pub struct HealthEndpoints;

impl HealthEndpoints {
    /// Get the current health status as a string
    pub async fn get_health_status(app_state: Option<Arc<AppState>>) -> String {
        match app_state {
            Some(state) => match HealthCheck::check(state).await {
                Ok(health) => health.status.to_string(),
                Err(_) => "error".to_string(),
            },
            None => "unhealthy".to_string(),
        }
    }

    /// Get the current metrics in Prometheus text format
    pub fn get_metrics_text(metrics_collector: &MetricsCollector) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = metrics_collector.registry().gather();
        encoder
            .encode_to_string(&metric_families)
            .context("Failed to encode metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::MatchStore;
    use crate::types::PvpMode;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_server() -> HealthServer {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap());
        HealthServer::new(HealthServerConfig::default(), metrics_collector)
    }

    #[test]
    fn test_config_defaults() {
        let config = HealthServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let server = test_server();
        let router = server.create_router();

        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_prometheus_text() {
        let server = test_server();
        server
            .state
            .metrics_collector
            .record_match_created(PvpMode::BlindRace);
        let router = server.create_router();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("grid_arena_matches_created_total"));
    }

    #[tokio::test]
    async fn test_endpoints_unavailable_without_app_state() {
        let server = test_server();

        for uri in ["/health", "/ready", "/alive", "/stats"] {
            let response = server
                .create_router()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(
                response.status(),
                StatusCode::SERVICE_UNAVAILABLE,
                "expected 503 for {}",
                uri
            );
        }

        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/matchmaking/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_trigger_matching_pairs_waiting_players() {
        let app = Arc::new(AppState::new(AppConfig::default()).await.unwrap());
        app.manager()
            .join_matchmaking("alice", "Alice", PvpMode::LiveBattle)
            .await
            .unwrap();
        app.manager()
            .join_matchmaking("bob", "Bob", PvpMode::LiveBattle)
            .await
            .unwrap();

        let server = test_server();
        server.set_app_state(app.clone()).await;

        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/matchmaking/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["matches_created"], 1);
        assert_eq!(value["players_matched"], 2);
        assert_eq!(app.store().count_active_matches().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stats_endpoint_with_app_state() {
        let app = Arc::new(AppState::new(AppConfig::default()).await.unwrap());
        let server = test_server();
        server.set_app_state(app).await;

        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // The service is built but not started, stats still serve
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["service"]["name"], "grid-arena");
        assert_eq!(value["service"]["status"], "unhealthy");
        assert_eq!(value["matches"]["active"], 0);
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let server = test_server();
        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .uri("/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoints_helper() {
        let status = HealthEndpoints::get_health_status(None).await;
        assert_eq!(status, "unhealthy");

        let metrics_collector = MetricsCollector::new().unwrap();
        metrics_collector.record_queue_join(PvpMode::LiveBattle);
        let text = HealthEndpoints::get_metrics_text(&metrics_collector).unwrap();
        assert!(text.contains("grid_arena_players_queued_total"));
    }
}
