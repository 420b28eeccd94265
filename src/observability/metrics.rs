//! Metrics collection and exposition.
//!
//! # Metrics
//! - `form2json_requests_total` (counter): requests by outcome
//!   (`passthrough`, `converted`, or the error label)
//! - `form2json_parts_total` (counter): converted parts by type
//! - `form2json_spilled_files_total` (counter): uploads written to disk
//! - `form2json_conversion_duration_seconds` (histogram): conversion latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is optional and serves its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::form::{Part, PartKind};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of one request seen by the middleware.
pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("form2json_requests_total", "outcome" => outcome).increment(1);
    if outcome != "passthrough" {
        histogram!("form2json_conversion_duration_seconds", "outcome" => outcome)
            .record(start.elapsed().as_secs_f64());
    }
}

/// Count converted parts by type.
pub fn record_parts(parts: &[Part]) {
    let files = parts.iter().filter(|part| part.kind == PartKind::File).count() as u64;
    let texts = parts.len() as u64 - files;
    if texts > 0 {
        counter!("form2json_parts_total", "type" => PartKind::Text.as_str()).increment(texts);
    }
    if files > 0 {
        counter!("form2json_parts_total", "type" => PartKind::File.as_str()).increment(files);
    }
}

pub fn record_spilled_files(count: usize) {
    counter!("form2json_spilled_files_total").increment(count as u64);
}
