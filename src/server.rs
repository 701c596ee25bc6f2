//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding config, the
//! broadcast service, uptime and the shutdown watch), [`build_router`] for
//! constructing the Axum router with middleware layers, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::{watch, RwLock};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::broadcast::BroadcastService;
use crate::config::model::Config;
use crate::config::ConfigVersion;
use crate::delivery::{longpoll, metrics, publish, websocket};
use crate::health::health_handler;

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Arc<Config>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub loaded_at: Instant,
}

impl LoadedConfig {
    #[must_use]
    pub fn new(config: Config, version: ConfigVersion, source_name: impl Into<String>) -> Self {
        Self {
            config: Arc::new(config),
            version,
            source_name: source_name.into(),
            loaded_at: Instant::now(),
        }
    }
}

pub struct AppState {
    pub config: RwLock<LoadedConfig>,
    pub broadcast: BroadcastService,
    pub start_time: Instant,
    /// Flips to `true` when the server starts shutting down; open
    /// WebSocket connections watch it and close.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    #[must_use]
    pub fn new(
        loaded: LoadedConfig,
        broadcast: BroadcastService,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config: RwLock::new(loaded),
            broadcast,
            start_time: Instant::now(),
            shutdown,
        }
    }
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/{channel}", get(websocket::ws_handler))
        .route("/poll", get(longpoll::poll_query_handler))
        .route("/poll/{channel}", get(longpoll::poll_path_handler))
        .route("/publish/{channel}", post(publish::publish_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/metrics/reset", post(metrics::reset_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
