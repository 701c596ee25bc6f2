//! Client-facing delivery adapters.
//!
//! [`websocket`] streams every envelope of one channel over a persistent
//! connection; [`longpoll`] answers a single HTTP request with the next
//! envelope (or a timeout). [`publish`] and [`metrics`] expose the
//! publisher and the metrics collector over HTTP.
//!
//! Every JSON body produced here is an [`ApiResponse`] and is sent with
//! HTTP 200; success, timeout and errors are distinguished by `code`.

pub mod longpoll;
pub mod metrics;
pub mod publish;
pub mod websocket;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::broadcast::Envelope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ApiResponse {
    pub const OK: u16 = 0;
    pub const BAD_REQUEST: u16 = 400;
    pub const TIMEOUT: u16 = 408;
    pub const INTERNAL: u16 = 500;

    #[must_use]
    pub fn envelope(envelope: &Envelope) -> Self {
        match serde_json::to_value(envelope) {
            Ok(data) => Self {
                code: Self::OK,
                data: Some(data),
                msg: None,
            },
            Err(e) => Self::error(Self::INTERNAL, e.to_string()),
        }
    }

    /// Nothing arrived in time. `now_ms` is the cursor the client should
    /// send as `since` next.
    #[must_use]
    pub fn timed_out(now_ms: i64) -> Self {
        Self {
            code: Self::TIMEOUT,
            data: Some(json!({ "timestamp": now_ms })),
            msg: None,
        }
    }

    #[must_use]
    pub fn error(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            data: None,
            msg: Some(msg.into()),
        }
    }

    /// The delivered envelope, if this is a success response carrying one.
    #[must_use]
    pub fn into_envelope(self) -> Option<Envelope> {
        if self.code != Self::OK {
            return None;
        }
        self.data.and_then(|data| serde_json::from_value(data).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_response_shape() {
        let envelope = Envelope {
            channel: "c1".into(),
            timestamp: 3,
            payload: json!("hello"),
        };
        let body = serde_json::to_value(ApiResponse::envelope(&envelope)).unwrap();
        assert_eq!(
            body,
            json!({"code": 0, "data": {"channel": "c1", "timestamp": 3, "payload": "hello"}})
        );
    }

    #[test]
    fn timeout_response_shape() {
        let body = serde_json::to_value(ApiResponse::timed_out(42)).unwrap();
        assert_eq!(body, json!({"code": 408, "data": {"timestamp": 42}}));
    }

    #[test]
    fn error_response_has_no_data() {
        let body = serde_json::to_value(ApiResponse::error(400, "missing channel")).unwrap();
        assert_eq!(body, json!({"code": 400, "msg": "missing channel"}));
    }

    #[test]
    fn only_success_yields_envelope() {
        assert!(ApiResponse::timed_out(1).into_envelope().is_none());
    }
}
