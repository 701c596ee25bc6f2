//! Metrics endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::broadcast::MetricsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    pub uptime_seconds: u64,
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        metrics: state.broadcast.metrics.snapshot(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// `POST /metrics/reset`. Counters go back to zero; the channel gauge is
/// left alone.
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let before = state.broadcast.metrics.snapshot();
    state.broadcast.metrics.reset();
    tracing::info!(
        sent = before.messages_sent,
        dropped = before.messages_dropped,
        "metrics counters reset"
    );
    Json(MetricsResponse {
        metrics: state.broadcast.metrics.snapshot(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
