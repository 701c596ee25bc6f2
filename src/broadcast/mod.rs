//! The broadcast core: envelopes, the local subscriber registry, the
//! catch-up cache, the distribution loop, publishing and metrics.
//!
//! [`BroadcastService`] wires these parts around one [`MessageBus`]. It is
//! constructed explicitly (never a global), so tests can run any number of
//! independent services side by side.

pub mod cache;
pub mod distributor;
pub mod envelope;
pub mod metrics;
pub mod publisher;
pub mod registry;

use std::sync::Arc;

use crate::bus::MessageBus;
use crate::config::model::Config;

pub use cache::CatchupCache;
pub use distributor::Distributor;
pub use envelope::Envelope;
pub use metrics::{Metrics, MetricsSnapshot};
pub use publisher::Publisher;
pub use registry::{SubscriberRegistry, Subscription};

#[derive(Clone)]
pub struct BroadcastService {
    bus: Arc<dyn MessageBus>,
    pub registry: Arc<SubscriberRegistry>,
    pub metrics: Arc<Metrics>,
    pub cache: CatchupCache,
    pub publisher: Publisher,
}

impl BroadcastService {
    /// Bus topic and cache settings are read once here; later config
    /// reloads do not change them.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, config: &Config) -> Self {
        let metrics = Arc::new(Metrics::new());
        let registry = Arc::new(SubscriberRegistry::new(Arc::clone(&metrics)));
        let cache = CatchupCache::new(Arc::clone(&bus), &config.cache);
        let publisher = Publisher::new(Arc::clone(&bus), config.bus.topic.clone());

        Self {
            bus,
            registry,
            metrics,
            cache,
            publisher,
        }
    }

    #[must_use]
    pub fn bus_name(&self) -> &'static str {
        self.bus.name()
    }

    /// Build the distribution loop for this service. Spawn its
    /// [`Distributor::run`] exactly once per process.
    #[must_use]
    pub fn distributor(&self, config: &Config) -> Distributor {
        Distributor::new(
            Arc::clone(&self.bus),
            Arc::clone(&self.registry),
            self.cache.clone(),
            Arc::clone(&self.metrics),
            &config.bus,
        )
    }
}
