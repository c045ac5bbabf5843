//! HTTP scrape server for netscrape.
//!
//! Each request to `/metrics/<exporter>` runs one bounded scrape and returns
//! its exposition text. The server counts its own traffic and serves those
//! counters on `/metrics`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────────┐
//! │  HTTP route  │────>│ ScrapeRunner │────>│ task | child process │
//! └──────┬───────┘     └──────────────┘     └──────────────────────┘
//!        │ events
//!        v
//! ┌──────────────┐
//! │  aggregator  │────> /metrics
//! └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! netscrape-server --config server.json5
//! curl 'http://localhost/metrics/cisco?target=rack-sw01'
//! ```
//!
//! See [`config::ServerConfig`] for configuration options.

pub mod args;
pub mod config;
pub mod http;
pub mod isolation;
pub mod metrics;
pub mod outcome;

pub use config::ServerConfig;
pub use http::{AppState, HttpServer, create_router, serve};
pub use isolation::{ProcessRunner, ScrapeRunner, SharedRunner, TaskRunner};
pub use metrics::ServerMetrics;
pub use outcome::ScrapeOutcome;
