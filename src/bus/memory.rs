//! In-process bus for single-node deployments and tests.
//!
//! Topics are `tokio::sync::broadcast` channels created on first
//! subscribe; the cache is a map of values with expiry instants that are
//! checked lazily on read and write.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::{BusStream, MessageBus};
use crate::config::model::CacheWritePolicy;
use crate::error::BeaconError;

const DEFAULT_TOPIC_CAPACITY: usize = 1024;

#[derive(Debug)]
struct CachedValue {
    value: String,
    expires_at: Instant,
}

impl CachedValue {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug)]
pub struct MemoryBus {
    topics: DashMap<String, broadcast::Sender<String>>,
    cache: DashMap<String, CachedValue>,
    capacity: usize,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// `capacity` bounds how far a slow topic subscriber may lag before it
    /// starts losing messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            cache: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |tx| tx.receiver_count())
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), BeaconError> {
        // No receivers is not an error; a publish nobody hears is still a publish.
        let _ = self.sender(topic).send(payload);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BusStream, BeaconError> {
        let rx = self.sender(topic).subscribe();
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(payload) => Some((Ok(payload), rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    let err = BeaconError::Bus {
                        backend: "memory",
                        source: format!("subscriber lagged, {skipped} messages skipped").into(),
                    };
                    Some((Err(err), rx))
                }
                Err(broadcast::error::RecvError::Closed) => None,
            }
        });
        Ok(stream.boxed())
    }

    async fn cache_get(&self, key: &str) -> Result<Option<String>, BeaconError> {
        let value = self
            .cache
            .get(key)
            .filter(|cached| cached.is_live())
            .map(|cached| cached.value.clone());

        if value.is_none() {
            self.cache.remove_if(key, |_, cached| !cached.is_live());
        }
        Ok(value)
    }

    async fn cache_set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        policy: CacheWritePolicy,
    ) -> Result<bool, BeaconError> {
        let fresh = CachedValue {
            value,
            expires_at: Instant::now() + ttl,
        };

        match self.cache.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if policy == CacheWritePolicy::SetIfAbsent && entry.get().is_live() {
                    return Ok(false);
                }
                entry.insert(fresh);
            }
            Entry::Vacant(entry) => {
                entry.insert(fresh);
            }
        }
        Ok(true)
    }
}
