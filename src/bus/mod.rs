//! Message bus backends.
//!
//! The [`MessageBus`] trait is the boundary to the shared external store
//! every node in a deployment talks to: a publish/subscribe topic plus a
//! TTL-keyed value cache. [`memory::MemoryBus`] serves a single process;
//! `redis_bus::RedisBus` (feature `redis`) spans a fleet.

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_bus;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::config::model::CacheWritePolicy;
use crate::error::BeaconError;

/// Raw payloads received on a subscribed topic. The stream ends when the
/// underlying connection is lost.
pub type BusStream = BoxStream<'static, Result<String, BeaconError>>;

// async_trait is required here because MessageBus is shared as Arc<dyn MessageBus>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait MessageBus: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, topic: &str, payload: String) -> Result<(), BeaconError>;

    async fn subscribe(&self, topic: &str) -> Result<BusStream, BeaconError>;

    async fn cache_get(&self, key: &str) -> Result<Option<String>, BeaconError>;

    /// Store `value` under `key` for `ttl`. Returns whether the value was
    /// written (always `true` for [`CacheWritePolicy::Overwrite`]).
    async fn cache_set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        policy: CacheWritePolicy,
    ) -> Result<bool, BeaconError>;
}
