//! Redis-backed bus shared by every node of a deployment.
//!
//! [`RedisBus`] publishes with `PUBLISH`, listens on a dedicated pub/sub
//! connection per subscription, and stores catch-up values with
//! `SET ... PX` (adding `NX` for set-if-absent writes). Commands go over a
//! multiplexed Tokio connection that is cheap to clone per call.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;

use super::{BusStream, MessageBus};
use crate::config::model::CacheWritePolicy;
use crate::error::BeaconError;

fn bus_error(e: redis::RedisError) -> BeaconError {
    BeaconError::Bus {
        backend: "redis",
        source: Box::new(e),
    }
}

pub struct RedisBus {
    client: redis::Client,
    connection: redis::aio::MultiplexedConnection,
}

impl RedisBus {
    pub async fn new(url: &str) -> Result<Self, BeaconError> {
        let client = redis::Client::open(url).map_err(bus_error)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(bus_error)?;

        Ok(Self { client, connection })
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), BeaconError> {
        let mut conn = self.connection.clone();
        let _receivers: i64 = conn.publish(topic, payload).await.map_err(bus_error)?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BusStream, BeaconError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(bus_error)?;
        pubsub.subscribe(topic).await.map_err(bus_error)?;

        let stream = pubsub
            .into_on_message()
            .map(|msg| msg.get_payload::<String>().map_err(bus_error));
        Ok(stream.boxed())
    }

    async fn cache_get(&self, key: &str) -> Result<Option<String>, BeaconError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(bus_error)
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn cache_set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        policy: CacheWritePolicy,
    ) -> Result<bool, BeaconError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("PX").arg(ttl.as_millis() as u64);
        if policy == CacheWritePolicy::SetIfAbsent {
            cmd.arg("NX");
        }

        let mut conn = self.connection.clone();
        // `SET ... NX` replies nil when the key already exists.
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(bus_error)?;
        Ok(reply.is_some())
    }
}
