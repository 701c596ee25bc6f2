//! Catch-up cache: the most recent envelope per channel, kept for a short
//! TTL in the bus backend so a new long-poll request can answer at once.

use std::sync::Arc;
use std::time::Duration;

use super::envelope::Envelope;
use crate::bus::MessageBus;
use crate::config::model::{CacheConfig, CacheWritePolicy};
use crate::error::BeaconError;

#[derive(Clone)]
pub struct CatchupCache {
    bus: Arc<dyn MessageBus>,
    prefix: String,
    ttl: Duration,
    policy: CacheWritePolicy,
}

impl CatchupCache {
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, config: &CacheConfig) -> Self {
        Self {
            bus,
            prefix: config.prefix.clone(),
            ttl: config.ttl(),
            policy: config.write_policy,
        }
    }

    #[must_use]
    pub fn key(&self, channel: &str) -> String {
        format!("{}/{channel}", self.prefix)
    }

    /// Write `envelope` under its channel's key. Returns `false` when the
    /// set-if-absent policy kept an older live value.
    pub async fn store(&self, envelope: &Envelope) -> Result<bool, BeaconError> {
        let value = envelope.encode()?;
        self.bus
            .cache_set(&self.key(&envelope.channel), value, self.ttl, self.policy)
            .await
    }

    pub async fn latest(&self, channel: &str) -> Result<Option<Envelope>, BeaconError> {
        match self.bus.cache_get(&self.key(channel)).await? {
            Some(raw) => Envelope::decode(&raw).map(Some).map_err(BeaconError::Decode),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::memory::MemoryBus;
    use serde_json::json;

    fn cache(policy: CacheWritePolicy) -> CatchupCache {
        let config = CacheConfig {
            write_policy: policy,
            ..CacheConfig::default()
        };
        CatchupCache::new(Arc::new(MemoryBus::new()), &config)
    }

    #[test]
    fn keys_are_namespaced() {
        let cache = cache(CacheWritePolicy::SetIfAbsent);
        assert_eq!(cache.key("user:42"), "beacon/user:42");
    }

    #[tokio::test]
    async fn stored_envelope_reads_back() {
        let cache = cache(CacheWritePolicy::SetIfAbsent);
        let envelope = Envelope::new("c1", json!({"n": 1}));

        assert!(cache.store(&envelope).await.unwrap());
        assert_eq!(cache.latest("c1").await.unwrap(), Some(envelope));
        assert_eq!(cache.latest("c2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_if_absent_retains_first_envelope() {
        let cache = cache(CacheWritePolicy::SetIfAbsent);
        let first = Envelope::new("c1", json!(1));
        let second = Envelope::new("c1", json!(2));

        cache.store(&first).await.unwrap();
        assert!(!cache.store(&second).await.unwrap());
        assert_eq!(cache.latest("c1").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn overwrite_retains_latest_envelope() {
        let cache = cache(CacheWritePolicy::Overwrite);
        let first = Envelope::new("c1", json!(1));
        let second = Envelope::new("c1", json!(2));

        cache.store(&first).await.unwrap();
        cache.store(&second).await.unwrap();
        assert_eq!(cache.latest("c1").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn corrupt_entry_reports_a_decode_error() {
        let cache = cache(CacheWritePolicy::Overwrite);
        cache
            .bus
            .cache_set(
                &cache.key("c1"),
                "not an envelope".into(),
                Duration::from_secs(10),
                CacheWritePolicy::Overwrite,
            )
            .await
            .unwrap();

        let err = cache.latest("c1").await.unwrap_err();
        assert!(matches!(err, BeaconError::Decode(_)));
        assert!(err.to_string().contains("decoded"));
    }
}
