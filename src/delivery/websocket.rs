//! WebSocket delivery.
//!
//! After the upgrade the connection joins the registry for its channel and
//! one task drives it until any of these happens: a keepalive ping cannot be
//! written, an envelope cannot be written, the client closes or errors, or
//! the server begins shutting down. The subscription is dropped (leaving
//! the registry) before the close frame is sent.
//!
//! Clients are not expected to send anything. Inbound frames other than
//! `Close` are read and discarded so pongs are consumed.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};

use crate::broadcast::envelope::validate_channel;
use crate::config::model::WebSocketConfig;
use crate::server::AppState;

/// `GET /ws/{channel}`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(e) = validate_channel(&channel) {
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    let settings = state.config.read().await.config.websocket.clone();
    ws.on_failed_upgrade(|e| tracing::warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| serve_socket(socket, state, channel, settings))
}

async fn serve_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    channel: String,
    settings: WebSocketConfig,
) {
    let mut subscription = state.broadcast.registry.join(&channel, settings.buffer);
    let subscriber = subscription.id();
    tracing::info!(channel = %channel, subscriber = %subscriber, "websocket subscribed");

    let (mut sink, mut inbound) = socket.split();
    let mut shutdown = state.shutdown.clone();

    let period = settings.ping_interval();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    tracing::debug!(subscriber = %subscriber, error = %e, "ping write failed");
                    break "ping failed";
                }
            }
            next = subscription.recv() => {
                let Some(envelope) = next else {
                    break "subscription closed";
                };
                let text = match envelope.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(subscriber = %subscriber, error = %e, "failed to encode envelope");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::debug!(subscriber = %subscriber, error = %e, "envelope write failed");
                    break "write failed";
                }
            }
            frame = inbound.next() => match frame {
                None | Some(Ok(Message::Close(_))) => break "client closed",
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %subscriber, error = %e, "websocket read failed");
                    break "read failed";
                }
                Some(Ok(_)) => {}
            },
            _ = shutdown.changed() => break "server shutting down",
        }
    };

    drop(subscription);
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;

    tracing::info!(channel = %channel, subscriber = %subscriber, reason, "websocket closed");
}
