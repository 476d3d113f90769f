//! Monitoring HTTP server

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use crate::audio::SharedJitterBuffer;
use crate::bridge::BridgeStats;
use crate::config::MonitorConfig;
use crate::monitor::handlers;

/// Shared state for handlers
pub struct AppState {
    pub stats: Arc<BridgeStats>,
    pub jitter_buffer: SharedJitterBuffer,
}

/// Serves `/health`, `/stats` and `/stats/jitter`
pub struct MonitorServer {
    config: MonitorConfig,
    state: Arc<AppState>,
}

impl MonitorServer {
    pub fn new(config: MonitorConfig, stats: Arc<BridgeStats>, jitter_buffer: SharedJitterBuffer) -> Self {
        Self {
            config,
            state: Arc::new(AppState {
                stats,
                jitter_buffer,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::get_health))
            .route("/stats", get(handlers::get_stats))
            .route("/stats/jitter", get(handlers::get_jitter_stats))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Serve until the task is aborted
    pub async fn run(self) -> std::io::Result<()> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Monitor listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await
    }

    /// Start the server in a background task
    pub fn start_background(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("Monitor server error: {}", e);
            }
        })
    }
}
