//! The unit exchanged over the bus and delivered to subscribers.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::BeaconError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    /// Milliseconds since the Unix epoch, stamped by the publisher.
    pub timestamp: i64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            channel: channel.into(),
            timestamp: now_millis(),
            payload,
        }
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn validate_channel(channel: &str) -> Result<(), BeaconError> {
    if channel.trim().is_empty() {
        return Err(BeaconError::InvalidChannel(
            "channel name cannot be empty".into(),
        ));
    }
    if channel.chars().any(char::is_control) {
        return Err(BeaconError::InvalidChannel(format!(
            "channel name {channel:?} contains control characters"
        )));
    }
    Ok(())
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}
