//! Process-wide delivery counters.
//!
//! The active-channel count is a gauge reflecting live registry state, so
//! [`Metrics::reset`] leaves it alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct Metrics {
    active_channels: AtomicU64,
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
    last_dispatch_latency_us: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub active_channels: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub last_dispatch_latency_us: u64,
}

impl Metrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active_channels: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            last_dispatch_latency_us: AtomicU64::new(0),
        }
    }

    pub(crate) fn channel_opened(&self) {
        self.active_channels.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn channel_closed(&self) {
        // The gauge never wraps below zero.
        let _ = self
            .active_channels
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn record_latency(&self, latency: Duration) {
        self.last_dispatch_latency_us
            .store(latency.as_micros() as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn active_channels(&self) -> u64 {
        self.active_channels.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn last_dispatch_latency(&self) -> Duration {
        Duration::from_micros(self.last_dispatch_latency_us.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_channels: self.active_channels(),
            messages_sent: self.messages_sent(),
            messages_dropped: self.messages_dropped(),
            last_dispatch_latency_us: self.last_dispatch_latency_us.load(Ordering::Relaxed),
        }
    }

    /// Zero the cumulative counters. The active-channel gauge is kept.
    pub fn reset(&self) {
        self.messages_sent.store(0, Ordering::Relaxed);
        self.messages_dropped.store(0, Ordering::Relaxed);
        self.last_dispatch_latency_us.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_active_channels() {
        let metrics = Metrics::new();
        metrics.channel_opened();
        metrics.channel_opened();
        metrics.record_sent();
        metrics.record_dropped();
        metrics.record_latency(Duration::from_micros(750));

        metrics.reset();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                active_channels: 2,
                messages_sent: 0,
                messages_dropped: 0,
                last_dispatch_latency_us: 0,
            }
        );
    }

    #[test]
    fn latency_is_last_value_not_sum() {
        let metrics = Metrics::new();
        metrics.record_latency(Duration::from_micros(100));
        metrics.record_latency(Duration::from_micros(40));
        assert_eq!(metrics.last_dispatch_latency(), Duration::from_micros(40));
    }

    #[test]
    fn closing_unopened_channel_does_not_underflow() {
        let metrics = Metrics::new();
        metrics.channel_closed();
        assert_eq!(metrics.active_channels(), 0);
    }
}
