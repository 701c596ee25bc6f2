//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload with the server version,
//! uptime, config source metadata, the bus backend in use, and the
//! current delivery metrics.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::broadcast::MetricsSnapshot;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub bus: BusHealth,
    pub stats: MetricsSnapshot,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
}

#[derive(Serialize, Deserialize)]
pub struct BusHealth {
    pub backend: String,
    pub topic: String,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = {
        let loaded = state.config.read().await;
        ConfigHealth {
            source: loaded.source_name.clone(),
            version: loaded.version.short().to_string(),
            loaded_ago_seconds: loaded.loaded_at.elapsed().as_secs(),
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config,
        bus: BusHealth {
            backend: state.broadcast.bus_name().to_string(),
            topic: state.broadcast.publisher.topic().to_string(),
        },
        stats: state.broadcast.metrics.snapshot(),
    })
}
