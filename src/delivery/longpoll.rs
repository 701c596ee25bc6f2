//! Long-poll delivery.
//!
//! One request, one answer. The catch-up cache is consulted first; only if
//! it has nothing at or after the client's `since` cursor does the request
//! join the registry and wait, bounded by the resolved timeout, for the
//! next envelope on its channel. The [`Subscription`] guard leaves the
//! registry on every path, including the client hanging up mid-wait (axum
//! drops the handler future). A waiting request is released with the
//! timeout body as soon as server shutdown begins.
//!
//! [`Subscription`]: crate::broadcast::Subscription

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tokio::sync::watch;

use super::ApiResponse;
use crate::broadcast::envelope::{now_millis, validate_channel};
use crate::broadcast::BroadcastService;
use crate::config::model::LongPollConfig;
use crate::server::AppState;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PollQuery {
    pub channel: Option<String>,
    /// Last timestamp (ms) the client has seen.
    pub since: Option<i64>,
    /// Requested wait in ms; see [`LongPollConfig::resolve_timeout`].
    pub timeout: Option<u64>,
}

/// `GET /poll/{channel}`
pub async fn poll_path_handler(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> Json<ApiResponse> {
    match query {
        Ok(Query(query)) => Json(poll_with_state(&state, Some(channel), query).await),
        Err(rejection) => Json(ApiResponse::error(
            ApiResponse::BAD_REQUEST,
            rejection.body_text(),
        )),
    }
}

/// `GET /poll?channel=...`
pub async fn poll_query_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> Json<ApiResponse> {
    match query {
        Ok(Query(query)) => {
            let channel = query.channel.clone();
            Json(poll_with_state(&state, channel, query).await)
        }
        Err(rejection) => Json(ApiResponse::error(
            ApiResponse::BAD_REQUEST,
            rejection.body_text(),
        )),
    }
}

async fn poll_with_state(
    state: &AppState,
    channel: Option<String>,
    query: PollQuery,
) -> ApiResponse {
    // Copy the settings out so the config lock is not held while waiting.
    let settings = state.config.read().await.config.longpoll.clone();
    long_poll(
        &state.broadcast,
        &settings,
        channel.as_deref(),
        &query,
        state.shutdown.clone(),
    )
    .await
}

/// Serve one long-poll request against `broadcast`. The wait ends early,
/// with the timeout body, once `shutdown` flips or its sender is dropped.
pub async fn long_poll(
    broadcast: &BroadcastService,
    settings: &LongPollConfig,
    channel: Option<&str>,
    query: &PollQuery,
    mut shutdown: watch::Receiver<bool>,
) -> ApiResponse {
    let Some(channel) = channel.filter(|c| !c.is_empty()) else {
        return ApiResponse::error(ApiResponse::BAD_REQUEST, "missing channel parameter");
    };
    if let Err(e) = validate_channel(channel) {
        return ApiResponse::error(ApiResponse::BAD_REQUEST, e.to_string());
    }

    let since = query.since.unwrap_or(0);
    let wait = settings.resolve_timeout(query.timeout);

    match broadcast.cache.latest(channel).await {
        Ok(Some(envelope)) if envelope.timestamp >= since => {
            tracing::debug!(channel = %channel, since, "long-poll served from catch-up cache");
            return ApiResponse::envelope(&envelope);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(channel = %channel, error = %e, "catch-up cache read failed, listening instead");
        }
    }

    let mut subscription = broadcast.registry.join(channel, 1);
    let response = tokio::select! {
        delivered = tokio::time::timeout(wait, subscription.recv()) => match delivered {
            Ok(Some(envelope)) => ApiResponse::envelope(&envelope),
            Ok(None) => ApiResponse::error(ApiResponse::INTERNAL, "subscription closed"),
            Err(_) => ApiResponse::timed_out(now_millis()),
        },
        _ = shutdown.wait_for(|stopping| *stopping) => {
            tracing::debug!(channel = %channel, "long-poll released by shutdown");
            ApiResponse::timed_out(now_millis())
        }
    };
    drop(subscription);

    tracing::debug!(
        channel = %channel,
        code = response.code,
        timeout = ?wait,
        "long-poll finished"
    );
    response
}
