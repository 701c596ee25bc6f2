//! `POST /publish/{channel}`: publish the JSON request body as a payload.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use super::ApiResponse;
use crate::error::BeaconError;
use crate::server::AppState;

pub async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Json<ApiResponse> {
    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            return Json(ApiResponse::error(
                ApiResponse::BAD_REQUEST,
                rejection.body_text(),
            ))
        }
    };

    match state.broadcast.publisher.publish(&channel, payload).await {
        Ok(envelope) => Json(ApiResponse::envelope(&envelope)),
        Err(e @ BeaconError::InvalidChannel(_)) => {
            Json(ApiResponse::error(ApiResponse::BAD_REQUEST, e.to_string()))
        }
        Err(e) => {
            tracing::error!(channel = %channel, error = %e, "publish failed");
            Json(ApiResponse::error(ApiResponse::INTERNAL, e.to_string()))
        }
    }
}
