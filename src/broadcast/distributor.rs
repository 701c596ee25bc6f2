//! The distribution loop.
//!
//! One [`Distributor`] runs per process. It holds a single subscription to
//! the shared bus topic, so the number of external subscriptions does not
//! grow with the number of logical channels. Every envelope received is
//! fanned out to the local subscribers of its channel and then written to
//! the catch-up cache, whether or not anyone on this node was listening.
//!
//! Delivery uses `try_send` into each subscriber's bounded queue: a full or
//! closed queue counts a drop instead of holding up the rest of the
//! channel. Bus failures are retried with exponential backoff until the
//! shutdown signal fires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;

use super::cache::CatchupCache;
use super::envelope::Envelope;
use super::metrics::Metrics;
use super::registry::SubscriberRegistry;
use crate::bus::MessageBus;
use crate::config::model::BusConfig;

pub struct Distributor {
    bus: Arc<dyn MessageBus>,
    registry: Arc<SubscriberRegistry>,
    cache: CatchupCache,
    metrics: Arc<Metrics>,
    topic: String,
    retry_initial: Duration,
    retry_max: Duration,
}

impl Distributor {
    #[must_use]
    pub fn new(
        bus: Arc<dyn MessageBus>,
        registry: Arc<SubscriberRegistry>,
        cache: CatchupCache,
        metrics: Arc<Metrics>,
        config: &BusConfig,
    ) -> Self {
        Self {
            bus,
            registry,
            cache,
            metrics,
            topic: config.topic.clone(),
            retry_initial: config.retry_initial(),
            retry_max: config.retry_max(),
        }
    }

    /// Run until `shutdown` changes or its sender is dropped.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = self.retry_initial;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let subscribed = tokio::select! {
                result = self.bus.subscribe(&self.topic) => result,
                _ = shutdown.changed() => break,
            };

            match subscribed {
                Ok(mut stream) => {
                    tracing::info!(
                        topic = %self.topic,
                        backend = self.bus.name(),
                        "subscribed to bus topic"
                    );

                    loop {
                        tokio::select! {
                            item = stream.next() => match item {
                                Some(Ok(raw)) => {
                                    self.dispatch(&raw).await;
                                    backoff = self.retry_initial;
                                }
                                Some(Err(e)) => {
                                    self.metrics.record_dropped();
                                    tracing::warn!(error = %e, "bus receive error");
                                }
                                None => {
                                    self.metrics.record_dropped();
                                    tracing::warn!(topic = %self.topic, "bus subscription ended");
                                    break;
                                }
                            },
                            _ = shutdown.changed() => {
                                tracing::debug!("distribution loop shutting down");
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    self.metrics.record_dropped();
                    tracing::warn!(
                        topic = %self.topic,
                        error = %e,
                        retry_in_ms = backoff.as_millis() as u64,
                        "bus subscribe failed"
                    );
                }
            }

            tokio::select! {
                () = tokio::time::sleep(backoff) => {}
                _ = shutdown.changed() => break,
            }
            backoff = (backoff * 2).min(self.retry_max);
        }

        tracing::debug!("distribution loop shutting down");
    }

    /// Decode one raw bus message, fan it out locally and refresh the
    /// catch-up cache.
    pub async fn dispatch(&self, raw: &str) {
        let received_at = Instant::now();

        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.metrics.record_dropped();
                tracing::debug!(error = %e, "dropping undecodable bus message");
                return;
            }
        };

        let mut delivered = 0usize;
        if let Some(subscribers) = self.registry.snapshot(&envelope.channel) {
            for subscriber in subscribers {
                match subscriber.try_deliver(envelope.clone()) {
                    Ok(()) => {
                        self.metrics.record_sent();
                        delivered += 1;
                    }
                    Err(TrySendError::Full(_)) => {
                        self.metrics.record_dropped();
                        tracing::debug!(
                            channel = %envelope.channel,
                            subscriber = %subscriber.id(),
                            "subscriber queue full, message dropped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        self.metrics.record_dropped();
                        tracing::debug!(
                            channel = %envelope.channel,
                            subscriber = %subscriber.id(),
                            "subscriber gone, message dropped"
                        );
                    }
                }
            }
        }
        self.metrics.record_latency(received_at.elapsed());

        tracing::trace!(
            channel = %envelope.channel,
            timestamp = envelope.timestamp,
            delivered,
            "envelope dispatched"
        );

        if let Err(e) = self.cache.store(&envelope).await {
            tracing::warn!(channel = %envelope.channel, error = %e, "catch-up cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::publisher::Publisher;
    use crate::bus::memory::MemoryBus;
    use crate::bus::BusStream;
    use crate::config::model::{CacheConfig, CacheWritePolicy};
    use crate::error::BeaconError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        bus: Arc<MemoryBus>,
        registry: Arc<SubscriberRegistry>,
        cache: CatchupCache,
        metrics: Arc<Metrics>,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(MemoryBus::new());
        let metrics = Arc::new(Metrics::new());
        let registry = Arc::new(SubscriberRegistry::new(Arc::clone(&metrics)));
        let cache = CatchupCache::new(bus.clone(), &CacheConfig::default());
        Fixture {
            bus,
            registry,
            cache,
            metrics,
        }
    }

    fn distributor_over(bus: Arc<dyn MessageBus>, f: &Fixture) -> Distributor {
        let config = BusConfig {
            retry_initial_ms: 10,
            retry_max_ms: 40,
            ..BusConfig::default()
        };
        Distributor::new(
            bus,
            Arc::clone(&f.registry),
            f.cache.clone(),
            Arc::clone(&f.metrics),
            &config,
        )
    }

    fn distributor(f: &Fixture) -> Distributor {
        distributor_over(f.bus.clone(), f)
    }

    fn raw(channel: &str, timestamp: i64, payload: serde_json::Value) -> String {
        Envelope {
            channel: channel.into(),
            timestamp,
            payload,
        }
        .encode()
        .unwrap()
    }

    async fn wait_for_topic_subscriber(bus: &MemoryBus, topic: &str) {
        while bus.subscriber_count(topic) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn dispatch_without_subscribers_still_updates_cache() {
        let f = fixture();
        distributor(&f).dispatch(&raw("c1", 7, json!("hello"))).await;

        let cached = f.cache.latest("c1").await.unwrap().unwrap();
        assert_eq!(cached.timestamp, 7);
        assert_eq!(f.metrics.messages_sent(), 0);
        assert_eq!(f.metrics.messages_dropped(), 0);
    }

    #[tokio::test]
    async fn dispatch_reaches_only_the_target_channel() {
        let f = fixture();
        let mut a = f.registry.join("c1", 4);
        let mut b = f.registry.join("c1", 4);
        let mut other = f.registry.join("c2", 4);

        distributor(&f).dispatch(&raw("c1", 1, json!("x"))).await;

        assert_eq!(a.recv().await.unwrap().payload, json!("x"));
        assert_eq!(b.recv().await.unwrap().payload, json!("x"));
        assert!(tokio::time::timeout(Duration::from_millis(20), other.recv())
            .await
            .is_err());
        assert_eq!(f.metrics.messages_sent(), 2);
    }

    #[tokio::test]
    async fn undecodable_message_counts_as_dropped() {
        let f = fixture();
        distributor(&f).dispatch("{not an envelope").await;
        assert_eq!(f.metrics.messages_dropped(), 1);
    }

    #[tokio::test]
    async fn full_subscriber_does_not_block_others() {
        let f = fixture();
        let _stalled = f.registry.join("c1", 1);
        let mut healthy = f.registry.join("c1", 4);
        let d = distributor(&f);

        d.dispatch(&raw("c1", 1, json!(1))).await;
        d.dispatch(&raw("c1", 2, json!(2))).await;

        assert_eq!(healthy.recv().await.unwrap().timestamp, 1);
        assert_eq!(healthy.recv().await.unwrap().timestamp, 2);
        assert_eq!(f.metrics.messages_sent(), 3);
        assert_eq!(f.metrics.messages_dropped(), 1);
    }

    #[tokio::test]
    async fn set_if_absent_cache_keeps_first_envelope() {
        let f = fixture();
        let d = distributor(&f);
        d.dispatch(&raw("c1", 1, json!("first"))).await;
        d.dispatch(&raw("c1", 2, json!("second"))).await;

        assert_eq!(f.cache.latest("c1").await.unwrap().unwrap().timestamp, 1);
    }

    #[tokio::test]
    async fn overwrite_cache_keeps_latest_envelope() {
        let mut f = fixture();
        let config = CacheConfig {
            write_policy: CacheWritePolicy::Overwrite,
            ..CacheConfig::default()
        };
        f.cache = CatchupCache::new(f.bus.clone(), &config);
        let d = distributor(&f);
        d.dispatch(&raw("c1", 1, json!("first"))).await;
        d.dispatch(&raw("c1", 2, json!("second"))).await;

        assert_eq!(f.cache.latest("c1").await.unwrap().unwrap().timestamp, 2);
    }

    #[tokio::test]
    async fn run_delivers_published_messages_in_order() {
        let f = fixture();
        let topic = BusConfig::default().topic;
        let publisher = Publisher::new(f.bus.clone(), topic.clone());
        let mut sub = f.registry.join("c1", 8);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(distributor(&f).run(shutdown_rx));
        wait_for_topic_subscriber(&f.bus, &topic).await;

        for n in 1..=3 {
            publisher.publish("c1", json!(n)).await.unwrap();
        }
        for n in 1..=3 {
            assert_eq!(sub.recv().await.unwrap().payload, json!(n));
        }

        let _ = shutdown_tx.send(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    /// Refuses the first `failures` subscribe calls, then behaves like the
    /// wrapped in-memory bus.
    struct FlakyBus {
        inner: Arc<MemoryBus>,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl MessageBus for FlakyBus {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn publish(&self, topic: &str, payload: String) -> Result<(), BeaconError> {
            self.inner.publish(topic, payload).await
        }

        async fn subscribe(&self, topic: &str) -> Result<BusStream, BeaconError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BeaconError::Bus {
                    backend: "flaky",
                    source: "connection refused".into(),
                });
            }
            self.inner.subscribe(topic).await
        }

        async fn cache_get(&self, key: &str) -> Result<Option<String>, BeaconError> {
            self.inner.cache_get(key).await
        }

        async fn cache_set(
            &self,
            key: &str,
            value: String,
            ttl: Duration,
            policy: CacheWritePolicy,
        ) -> Result<bool, BeaconError> {
            self.inner.cache_set(key, value, ttl, policy).await
        }
    }

    #[tokio::test]
    async fn run_retries_failed_subscriptions() {
        let f = fixture();
        let flaky = Arc::new(FlakyBus {
            inner: f.bus.clone(),
            failures: AtomicUsize::new(2),
        });
        let topic = BusConfig::default().topic;
        let mut sub = f.registry.join("c1", 1);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(distributor_over(flaky, &f).run(shutdown_rx));
        wait_for_topic_subscriber(&f.bus, &topic).await;

        assert_eq!(f.metrics.messages_dropped(), 2);

        f.bus.publish(&topic, raw("c1", 9, json!("late"))).await.unwrap();
        assert_eq!(sub.recv().await.unwrap().timestamp, 9);

        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn run_exits_on_shutdown_while_backing_off() {
        let f = fixture();
        let flaky = Arc::new(FlakyBus {
            inner: f.bus.clone(),
            failures: AtomicUsize::new(usize::MAX),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(distributor_over(flaky, &f).run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(30)).await;

        let _ = shutdown_tx.send(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(f.metrics.messages_dropped() >= 1);
    }
}
