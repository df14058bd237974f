//! Prometheus metrics exporter.
//!
//! Counters are recorded with the `metrics` facade throughout the workspace;
//! this module only installs the Prometheus recorder and its scrape listener.
//!
//! ```rust,no_run
//! use whitelist_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! MetricsServer::new("0.0.0.0:9090".parse()?).start()?;
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus scrape endpoint.
#[derive(Debug, Clone, Copy)]
pub struct MetricsServer {
    addr: SocketAddr,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Install the recorder and start the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or a recorder
    /// is already installed.
    pub fn start(&self) -> Result<(), MetricsError> {
        register_metrics();

        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
        Ok(())
    }
}

fn register_metrics() {
    describe_counter!("store.commands.total", "Actions processed by the store");
    describe_counter!("store.effects.executed", "Effects executed, by type");
    describe_histogram!("store.reducer.duration_seconds", "Reducer execution time");
    describe_counter!("lifecycle.transitions", "Committed request status transitions");
    describe_counter!("lifecycle.rejections", "Rejected lifecycle commands, by reason");
    describe_counter!("directory.writes", "Whitelist membership changes sent to the game server");
    describe_counter!("notifications.failed", "Best-effort notifications that could not be delivered");
    describe_counter!("interactions.received", "Inbound gateway events, by kind");
    describe_counter!("record_store.writes", "Record store writes, by operation");
    describe_counter!("discord.requests", "Discord REST calls, by outcome");
    describe_counter!("retry.recovered", "Operations that succeeded after retrying");
    describe_counter!("retry.exhausted", "Operations that failed after every retry");
}
