//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (calls, latency, key provisioning, upstream traffic)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_calls_total` (counter): calls by method, outcome
//! - `gateway_call_duration_seconds` (histogram): latency by method
//! - `vault_records_created_total` (counter): key records provisioned
//! - `vault_creation_conflicts_total` (counter): creation races lost to another writer
//! - `upstream_calls_total` (counter): node RPC calls by method, outcome
//! - `upstream_healthy` (gauge): 1=reachable, 0=unreachable
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so library code and tests
//!   never need to set one up
//! - Labels carry method names and outcomes only, never user ids

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!("gateway_calls_total", "Gateway RPC calls by method and outcome");
    metrics::describe_histogram!(
        "gateway_call_duration_seconds",
        metrics::Unit::Seconds,
        "Gateway RPC call latency"
    );
    metrics::describe_counter!("vault_records_created_total", "Key records provisioned");
    metrics::describe_counter!(
        "vault_creation_conflicts_total",
        "First-access creation races resolved by re-read"
    );
    metrics::describe_counter!("upstream_calls_total", "Upstream node RPC calls");
    metrics::describe_gauge!("upstream_healthy", "Upstream node reachability");
}

/// Record one finished gateway call.
pub fn record_call(method: &str, outcome: &'static str, start_time: Instant) {
    metrics::counter!(
        "gateway_calls_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("gateway_call_duration_seconds", "method" => method.to_string())
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_key_created() {
    metrics::counter!("vault_records_created_total").increment(1);
}

pub fn record_creation_conflict() {
    metrics::counter!("vault_creation_conflicts_total").increment(1);
}

/// Record one upstream RPC attempt.
pub fn record_upstream_call(method: &str, outcome: &'static str) {
    metrics::counter!(
        "upstream_calls_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_upstream_health(healthy: bool) {
    metrics::gauge!("upstream_healthy").set(if healthy { 1.0 } else { 0.0 });
}
