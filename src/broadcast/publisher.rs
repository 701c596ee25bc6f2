//! Publishing side: stamp an envelope and put it on the shared bus topic.

use std::sync::Arc;

use super::envelope::{validate_channel, Envelope};
use crate::bus::MessageBus;
use crate::error::BeaconError;

#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn MessageBus>,
    topic: String,
}

impl Publisher {
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish `payload` to every node's subscribers of `channel`.
    ///
    /// Returns the envelope as sent. A failure here is reported to the
    /// caller only; it never reaches the distribution loop.
    pub async fn publish(
        &self,
        channel: &str,
        payload: serde_json::Value,
    ) -> Result<Envelope, BeaconError> {
        validate_channel(channel)?;

        let envelope = Envelope::new(channel, payload);
        self.bus.publish(&self.topic, envelope.encode()?).await?;

        tracing::debug!(
            channel = %channel,
            timestamp = envelope.timestamp,
            topic = %self.topic,
            "message published"
        );
        Ok(envelope)
    }
}
