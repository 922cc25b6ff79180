//! Prometheus Metrics for the rebalancer
//!
//! Uses the `metrics` crate facade. Without an installed recorder every call
//! is a no-op, so the controller records unconditionally.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and serve `/metrics` on `port`.
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}

// ============================================================================
// Metric Recording Helpers
// ============================================================================

/// Record a finished pass
pub fn record_pass(outcome: &'static str, duration_secs: f64) {
    counter!("rebalance_passes_total", "outcome" => outcome).increment(1);
    histogram!("rebalance_pass_duration_seconds").record(duration_secs);
}

/// Record a settings directive sent to the cluster
pub fn record_directive(kind: &'static str, success: bool) {
    let result = if success { "ok" } else { "error" };
    counter!("allocation_directives_total", "kind" => kind, "result" => result).increment(1);
}

/// Record a shard move and how it ended
pub fn record_move(outcome: &'static str) {
    counter!("rebalance_moves_total", "outcome" => outcome).increment(1);
}

/// Record the observed distribution
pub fn set_distribution(nodes: usize, spread: usize) {
    gauge!("cluster_nodes").set(nodes as f64);
    gauge!("shard_spread").set(spread as f64);
}
