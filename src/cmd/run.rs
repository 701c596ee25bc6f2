//! `beacon run`: start the broadcast server.
//!
//! Loads configuration (file or built-in defaults), connects the message
//! bus, spawns the distribution loop, starts the Axum HTTP server with
//! graceful shutdown, and, when a config file is in use, spawns a
//! background refresh loop for hot-reloading tuning values.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::broadcast::BroadcastService;
use crate::bus::memory::MemoryBus;
use crate::bus::MessageBus;
use crate::cli::RunArgs;
use crate::config::model::Config;
use crate::config::sources::file_source::{self, FileSource};
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::BeaconError;
use crate::logging;
use crate::server::{self, AppState, LoadedConfig};

pub async fn execute(args: RunArgs) -> Result<(), BeaconError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let source = file_source::discover(args.config.as_deref()).await?;
    let loaded = match &source {
        Some(source) => {
            let (config, version) = source.load().await?;
            LoadedConfig::new(config, version, source.path().display().to_string())
        }
        None => {
            tracing::info!("no config file found, using built-in defaults");
            LoadedConfig::new(Config::default(), ConfigVersion::Builtin, "defaults")
        }
    };
    let config = Arc::clone(&loaded.config);

    let bus = connect_bus(&args).await?;
    let broadcast = BroadcastService::new(bus, &config);

    // Flipped once on shutdown; the distributor, the refresh loop and every
    // open WebSocket watch it.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let distributor = broadcast.distributor(&config);
    let distributor_handle = tokio::spawn(distributor.run(shutdown_rx.clone()));

    let state = Arc::new(AppState::new(loaded, broadcast, shutdown_rx.clone()));

    let refresh_handle = source.map(|source| {
        let refresh_state = Arc::clone(&state);
        let poll_interval = args.poll_interval;
        tokio::spawn(async move {
            config_refresh_loop(refresh_state, source, poll_interval, shutdown_rx).await;
        })
    });

    let backend = state.broadcast.bus_name();
    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        bus = backend,
        topic = %config.bus.topic,
        "beacon started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    if let Err(e) = distributor_handle.await {
        tracing::error!(error = %e, "distribution loop failed");
    }
    if let Some(handle) = refresh_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "config refresh task failed");
        }
    }

    tracing::info!("beacon stopped");
    Ok(())
}

async fn connect_bus(args: &RunArgs) -> Result<Arc<dyn MessageBus>, BeaconError> {
    #[cfg(feature = "redis")]
    if let Some(ref url) = args.redis_url {
        let bus = crate::bus::redis_bus::RedisBus::new(url).await?;
        tracing::info!("connected to redis bus");
        return Ok(Arc::new(bus));
    }

    #[cfg(not(feature = "redis"))]
    let _ = args;

    tracing::warn!("no shared bus configured, using the in-process bus (single node only)");
    Ok(Arc::new(MemoryBus::new()))
}

/// Sections that are read once when the broadcast service is built.
fn restart_required(current: &Config, next: &Config) -> Vec<&'static str> {
    let mut sections = Vec::new();
    if current.bus != next.bus {
        sections.push("bus");
    }
    if current.cache != next.cache {
        sections.push("cache");
    }
    sections
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    source: FileSource,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        let current_version = state.config.read().await.version.clone();

        match source.has_changed(&current_version).await {
            Ok(true) => {
                tracing::info!("config change detected, reloading");
                match source.load().await {
                    Ok((config, version)) => {
                        let mut loaded = state.config.write().await;
                        let stale = restart_required(&loaded.config, &config);
                        if !stale.is_empty() {
                            tracing::warn!(
                                sections = ?stale,
                                "changed sections take effect after a restart"
                            );
                        }
                        loaded.config = Arc::new(config);
                        loaded.version = version;
                        loaded.loaded_at = Instant::now();
                        let short = loaded.version.short().to_string();
                        drop(loaded);
                        tracing::info!(version = %short, "config reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "config reload failed, keeping current config");
                    }
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "config change check failed");
            }
        }
    }
}
