//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter, labels: namespace).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter, labels: namespace, reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge, labels: namespace).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime in seconds (histogram, labels: namespace).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Upgrades refused (counter, labels: reason).
pub const WS_REJECTED_TOTAL: &str = "ws_rejected_total";
/// Outbound messages dropped on a full queue (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Slow clients closed after too many drops (counter).
pub const WS_SLOW_CLIENT_EVICTIONS_TOTAL: &str = "ws_slow_client_evictions_total";
/// Inbound frames rejected (counter, labels: namespace, reason).
pub const FRAMES_REJECTED_TOTAL: &str = "frames_rejected_total";
/// Intents dispatched (counter, labels: kind).
pub const DISPATCH_TOTAL: &str = "dispatch_total";
/// Recipients per dispatch (histogram, labels: kind).
pub const DISPATCH_RECIPIENTS: &str = "dispatch_recipients";
/// Push fallback attempts (counter, labels: outcome).
pub const PUSH_OUTCOMES_TOTAL: &str = "push_outcomes_total";
/// Push requests dropped because the push queue was full (counter).
pub const PUSH_QUEUE_DROPS_TOTAL: &str = "push_queue_drops_total";
