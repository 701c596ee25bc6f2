//! Local subscriber registry.
//!
//! Maps each logical channel to the set of delivery queues currently
//! listening on it. Backed by a sharded [`DashMap`] so joins, leaves and
//! snapshots from many tasks never serialize on a global lock.
//!
//! A channel entry exists only while it has at least one subscriber. The
//! [`Subscription`] returned by [`SubscriberRegistry::join`] removes itself
//! when dropped, so every exit path of an adapter (completion, timeout,
//! disconnect, cancellation) releases its slot exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::envelope::Envelope;
use super::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(uuid::Uuid);

impl SubscriberId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sending half of one subscriber's delivery queue.
#[derive(Debug, Clone)]
pub struct SubscriberSender {
    id: SubscriberId,
    tx: mpsc::Sender<Envelope>,
}

impl SubscriberSender {
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Non-blocking delivery. Fails when the queue is full or the
    /// subscriber is gone.
    pub fn try_deliver(
        &self,
        envelope: Envelope,
    ) -> Result<(), mpsc::error::TrySendError<Envelope>> {
        self.tx.try_send(envelope)
    }
}

#[derive(Debug)]
pub struct SubscriberRegistry {
    channels: DashMap<String, HashMap<SubscriberId, SubscriberSender>>,
    metrics: Arc<Metrics>,
}

impl SubscriberRegistry {
    #[must_use]
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            channels: DashMap::new(),
            metrics,
        }
    }

    /// Register a new subscriber on `channel` with a queue of `capacity`
    /// envelopes (at least one).
    pub fn join(self: &Arc<Self>, channel: &str, capacity: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = SubscriberId::new();
        let sender = SubscriberSender { id, tx };

        match self.channels.entry(channel.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().insert(id, sender);
            }
            Entry::Vacant(entry) => {
                let _guard = entry.insert(HashMap::from([(id, sender)]));
                self.metrics.channel_opened();
            }
        }

        tracing::debug!(channel = %channel, subscriber = %id, "subscriber joined");

        Subscription {
            id,
            channel: channel.to_string(),
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    ///
    /// The channel entry is dropped only if it is still empty at removal
    /// time, so a concurrent `join` on the same channel is never lost.
    pub fn leave(&self, channel: &str, id: &SubscriberId) -> bool {
        let removed = match self.channels.get_mut(channel) {
            Some(mut set) => set.remove(id).is_some(),
            None => return false,
        };

        if self
            .channels
            .remove_if(channel, |_, set| set.is_empty())
            .is_some()
        {
            self.metrics.channel_closed();
            tracing::debug!(channel = %channel, "channel emptied");
        }

        if removed {
            tracing::debug!(channel = %channel, subscriber = %id, "subscriber left");
        }
        removed
    }

    /// Copy of the current subscriber set, or `None` when nobody on this
    /// node listens to `channel`.
    #[must_use]
    pub fn snapshot(&self, channel: &str) -> Option<Vec<SubscriberSender>> {
        self.channels
            .get(channel)
            .map(|set| set.values().cloned().collect())
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |set| set.len())
    }

    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }
}

/// A live registration. Receives envelopes until dropped; dropping leaves
/// the registry.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    channel: String,
    rx: mpsc::Receiver<Envelope>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next envelope. Returns `None` if the subscriber was
    /// removed from the registry out from under this handle.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.leave(&self.channel, &self.id);
    }
}
