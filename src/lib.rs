//! Wiretap - a transparent HTTP debug proxy with an on-disk audit trail.
//!
//! Wiretap sits between a client and one upstream service, relays every request
//! verbatim, and writes a complete record of each exchange to per-day log
//! files. It is built as a **hexagonal architecture**: business logic lives in
//! `core`, I/O concerns live behind `ports` traits with `adapters`
//! implementations. This library exposes the building blocks so the relay can
//! be embedded or composed inside your own application.
//!
//! # Features
//! - Verbatim forwarding of method, path, query, headers, and body for
//!   GET / POST / PUT / DELETE / PATCH
//! - HTTP and HTTPS upstreams (rustls with native root certificates)
//! - Every reply is HTTP 200 with a JSON envelope carrying the upstream
//!   status, headers, and body, so client tooling never needs error paths
//! - Per-day audit files: pretty-printed success records and timestamped
//!   error records in separate files
//! - Separate connect and read timeout budgets with a classified error
//!   taxonomy (connect timeout, read timeout, unreachable, protocol)
//! - Request IDs on every exchange and structured tracing via `tracing`
//! - Graceful shutdown that flushes queued audit records before exit
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use wiretap::{AuditFileLogger, Forwarder, UpstreamClientAdapter, config::ProxyConfig};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg: ProxyConfig = wiretap::config::load_config("config.json").await?;
//! let audit = Arc::new(AuditFileLogger::new("logs")?);
//! let client = Arc::new(UpstreamClientAdapter::new(
//!     cfg.connect_timeout(),
//!     cfg.read_timeout(),
//! )?);
//! let forwarder = Arc::new(Forwarder::new(cfg, client, audit));
//! let app = wiretap::router(forwarder);
//! // Serve `app` with axum (see the binary crate for the full wiring).
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping the forwarding and envelope logic inside `core`. End users
//! should prefer the re-exports documented below instead of reaching into
//! internal modules directly.
//!
//! # Error Handling
//! Setup APIs return `eyre::Result<T>` with context attached via `WrapErr`.
//! The relay path itself is infallible by design: upstream failures become a
//! fixed JSON failure reply plus an error-log record, never a transport error
//! to the caller.
//!
//! # License
//! Licensed under Apache-2.0.
//!
//! See README for usage patterns and the audit file format.
// Re-export public modules with explicit visibility controls
pub mod config;
pub mod ports;
pub mod tracing_setup;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{AuditFileLogger, UpstreamClientAdapter, router},
    core::{FAILURE_NOTICE, Forwarder, InboundRequest, failure_reply},
    ports::{AuditSink, UpstreamClient},
};
