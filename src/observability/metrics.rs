//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): inbound webhook requests by method, status
//! - `relay_groups_active` (gauge): live groups
//! - `relay_members_added_total` (counter): members admitted, by kind (create/join)
//! - `relay_members_removed_total` (counter): members reaped, by cause
//! - `relay_broadcasts_total` (counter): broadcasts performed
//! - `relay_deliveries_total` (counter): per-member deliveries by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the Prometheus exporter

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16) {
    ::metrics::counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_group_count(groups: usize) {
    ::metrics::gauge!("relay_groups_active").set(groups as f64);
}

pub fn record_member_added(kind: &'static str) {
    ::metrics::counter!("relay_members_added_total", "kind" => kind).increment(1);
}

pub fn record_member_removed(cause: &'static str) {
    ::metrics::counter!("relay_members_removed_total", "cause" => cause).increment(1);
}

pub fn record_broadcast(delivered: usize, members: usize) {
    ::metrics::counter!("relay_broadcasts_total").increment(1);
    ::metrics::counter!("relay_deliveries_total", "outcome" => "delivered")
        .increment(delivered as u64);
    ::metrics::counter!("relay_deliveries_total", "outcome" => "failed")
        .increment(members.saturating_sub(delivered) as u64);
}
