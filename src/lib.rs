//! Beacon is a broadcast fan-out server.
//!
//! Publishers post JSON payloads to named channels. Every node listens on
//! one shared bus topic and delivers each message to its locally
//! connected subscribers of that channel, over WebSocket or HTTP long
//! polling. The latest message per channel is kept briefly in a catch-up
//! cache so a long-poll client that reconnects between requests does not
//! miss it.
//!
//! # Architecture
//!
//! - [`broadcast`] -- Envelopes, the subscriber registry, the catch-up
//!   cache, the distribution loop, the publisher and delivery metrics.
//! - [`bus`] -- The [`MessageBus`](bus::MessageBus) trait with in-process
//!   and Redis implementations.
//! - [`delivery`] -- WebSocket, long-poll, publish and metrics HTTP handlers.
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate,
//!   health, publish).
//! - [`config`] -- Configuration loading, validation, and hot-reloading via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Axum server setup, shared application state, and graceful
//!   shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `redis` | Redis message bus and catch-up cache _(enabled by default)_ |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Public items exist for the binary and the integration tests.
#![allow(clippy::missing_errors_doc)]

pub mod broadcast;
pub mod bus;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod delivery;
pub mod error;
pub mod health;
pub mod logging;
pub mod server;
