//! Frontgate is a service-routing HTTP front end.
//!
//! Each inbound request names a service domain in its `s` query
//! parameter. Frontgate looks the domain up in a routing table built
//! once from the static configuration, picks one of the service's
//! backends at random, forwards the request over a traced connection,
//! and relays the backend's response unchanged. Requests carrying a
//! `health-check` header are answered by a health predicate instead.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health, backends).
//! - [`config`] -- Configuration model, loading, and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- Header-triggered health probes and the [`HealthChecker`](health::HealthChecker) seam.
//! - [`instrumentation`] -- Per-service backend latency metrics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Routing table, backend selection, latency tracing, and
//!   forwarding.
//! - [`server`] -- Axum server setup, shared application state, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `sentry-integration` | Sentry error tracking |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Public items exist for the binary and integration tests.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod instrumentation;
pub mod logging;
pub mod proxy;
pub mod server;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
