//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ws_proxy_admissions_total` (counter): upgrade requests by outcome
//! - `ws_proxy_sessions_active` (gauge): sessions currently relaying
//! - `ws_proxy_frames_relayed_total` (counter): frames copied, by direction
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests that never call [`init_metrics`] pay nothing.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const OUTCOME_ADMITTED: &str = "admitted";
pub const OUTCOME_ORIGIN_REJECTED: &str = "origin_rejected";
pub const OUTCOME_AUTH_REJECTED: &str = "auth_rejected";
pub const OUTCOME_DIAL_FAILED: &str = "dial_failed";
pub const OUTCOME_SHUTTING_DOWN: &str = "shutting_down";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_admission(outcome: &'static str) {
    metrics::counter!("ws_proxy_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_session_opened() {
    metrics::gauge!("ws_proxy_sessions_active").increment(1.0);
}

pub fn record_session_closed() {
    metrics::gauge!("ws_proxy_sessions_active").decrement(1.0);
}

pub fn record_frame(direction: &'static str) {
    metrics::counter!("ws_proxy_frames_relayed_total", "direction" => direction).increment(1);
}
