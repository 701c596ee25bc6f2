//! Serde data structures for the Beacon configuration file.
//!
//! Contains [`Config`] (the root) and its sections: [`BusConfig`],
//! [`CacheConfig`], [`WebSocketConfig`] and [`LongPollConfig`]. Every
//! field has a default, so an empty file is a valid config. All types
//! derive `Serialize` and `Deserialize` with `deny_unknown_fields` for
//! strict parsing, and default values are elided on serialization.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_topic() -> String {
    "beacon:broadcast".to_string()
}

const fn default_retry_initial_ms() -> u64 {
    250
}

const fn default_retry_max_ms() -> u64 {
    5000
}

fn default_prefix() -> String {
    "beacon".to_string()
}

const fn default_ttl_secs() -> u64 {
    10
}

const fn default_ping_interval_secs() -> u64 {
    30
}

const fn default_ws_buffer() -> usize {
    64
}

const fn default_min_timeout_ms() -> u64 {
    10_000
}

const fn default_max_timeout_ms() -> u64 {
    120_000
}

const fn default_poll_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "BusConfig::is_default")]
    pub bus: BusConfig,

    #[serde(default, skip_serializing_if = "CacheConfig::is_default")]
    pub cache: CacheConfig,

    #[serde(default, skip_serializing_if = "WebSocketConfig::is_default")]
    pub websocket: WebSocketConfig,

    #[serde(default, skip_serializing_if = "LongPollConfig::is_default")]
    pub longpoll: LongPollConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Shared topic every node publishes to and listens on.
    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

impl BusConfig {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub const fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms)
    }

    #[must_use]
    pub const fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }
}

/// How the catch-up cache treats a key that already holds a live value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWritePolicy {
    /// Keep the existing value until it expires.
    #[default]
    SetIfAbsent,
    /// Latest message always wins.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default)]
    pub write_policy: CacheWritePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            ttl_secs: default_ttl_secs(),
            write_policy: CacheWritePolicy::default(),
        }
    }
}

impl CacheConfig {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebSocketConfig {
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Envelopes queued per connection before new ones are dropped.
    #[serde(default = "default_ws_buffer")]
    pub buffer: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            buffer: default_ws_buffer(),
        }
    }
}

impl WebSocketConfig {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LongPollConfig {
    #[serde(default = "default_min_timeout_ms")]
    pub min_timeout_ms: u64,

    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    #[serde(default = "default_poll_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            min_timeout_ms: default_min_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            default_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl LongPollConfig {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// The wait to use for a requested timeout: the request itself when it
    /// lies inside `[min, max]`, otherwise the default.
    #[must_use]
    pub fn resolve_timeout(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .filter(|ms| (self.min_timeout_ms..=self.max_timeout_ms).contains(ms))
            .unwrap_or(self.default_timeout_ms);
        Duration::from_millis(ms)
    }
}
