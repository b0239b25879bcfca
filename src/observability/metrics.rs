//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingress_reconcile_total` (counter): cycles by outcome (applied, unchanged, failed)
//! - `ingress_reconcile_duration_seconds` (histogram): compile + apply latency
//! - `ingress_apply_failures_total` (counter): failed or timed-out applies
//! - `ingress_resync_total` (counter): full relists by reason
//! - `ingress_config_generation` (gauge): generation of the live document
//! - `ingress_requests_total` (counter): proxied requests by status, upstream
//! - `ingress_request_duration_seconds` (histogram): proxy latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder (tests) every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_reconcile(outcome: &'static str, start: Instant) {
    counter!("ingress_reconcile_total", "outcome" => outcome).increment(1);
    histogram!("ingress_reconcile_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_apply_failure() {
    counter!("ingress_apply_failures_total").increment(1);
}

pub fn record_resync(reason: &'static str) {
    counter!("ingress_resync_total", "reason" => reason).increment(1);
}

pub fn set_generation(generation: u64) {
    gauge!("ingress_config_generation").set(generation as f64);
}

pub fn record_request(status: u16, upstream: &str, start: Instant) {
    counter!(
        "ingress_requests_total",
        "status" => status.to_string(),
        "upstream" => upstream.to_string()
    )
    .increment(1);
    histogram!("ingress_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
