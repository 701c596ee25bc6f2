//! Shared harness: a real server on `127.0.0.1:0` over the in-process bus.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use beacon::broadcast::{BroadcastService, Envelope};
use beacon::bus::memory::MemoryBus;
use beacon::config::model::{Config, LongPollConfig};
use beacon::config::ConfigVersion;
use beacon::server::{self, AppState, LoadedConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    pub broadcast: BroadcastService,
    pub bus: Arc<MemoryBus>,
    shutdown_tx: watch::Sender<bool>,
    server: JoinHandle<()>,
}

/// Long-poll bounds small enough for tests to hit timeouts quickly.
pub fn quick_config() -> Config {
    Config {
        longpoll: LongPollConfig {
            min_timeout_ms: 10,
            max_timeout_ms: 10_000,
            default_timeout_ms: 2_000,
        },
        ..Config::default()
    }
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(quick_config()).await
    }

    pub async fn start_with(config: Config) -> Self {
        let bus = Arc::new(MemoryBus::new());
        let broadcast = BroadcastService::new(bus.clone(), &config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(broadcast.distributor(&config).run(shutdown_rx.clone()));

        let topic = config.bus.topic.clone();
        let state = Arc::new(AppState::new(
            LoadedConfig::new(config, ConfigVersion::Hash("test-hash".into()), "test"),
            broadcast.clone(),
            shutdown_rx.clone(),
        ));
        let router = server::build_router(state, 1_048_576);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut graceful = shutdown_rx;
        let server = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = graceful.changed().await;
            })
            .await
            .unwrap();
        });

        // Publishes are only heard once the distributor is on the topic.
        wait_until(|| bus.subscriber_count(&topic) > 0).await;

        Self {
            addr,
            broadcast,
            bus,
            shutdown_tx,
            server,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, channel: &str) -> String {
        format!("ws://{}/ws/{channel}", self.addr)
    }

    pub async fn publish(&self, channel: &str, payload: serde_json::Value) -> Envelope {
        let body: serde_json::Value = reqwest::Client::new()
            .post(self.url(&format!("/publish/{channel}")))
            .json(&payload)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["code"], 0, "publish failed: {body}");
        serde_json::from_value(body["data"].clone()).unwrap()
    }

    pub async fn wait_for_subscribers(&self, channel: &str, count: usize) {
        wait_until(|| self.broadcast.registry.subscriber_count(channel) == count).await;
    }

    /// Wait until the catch-up cache holds an envelope for `channel`.
    pub async fn wait_for_cached(&self, channel: &str) -> Envelope {
        for _ in 0..500 {
            if let Some(envelope) = self.broadcast.cache.latest(channel).await.unwrap() {
                return envelope;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("nothing cached for {channel}");
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = tokio::time::timeout(Duration::from_secs(5), self.server).await;
    }

    pub fn begin_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2.5s");
}
