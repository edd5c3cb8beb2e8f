//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants to avoid typos across modules.

/// Device frames received (counter).
pub const FRAMES_RECEIVED_TOTAL: &str = "m2_frames_received_total";
/// Device frames dropped (counter, labels: reason).
pub const FRAMES_DROPPED_TOTAL: &str = "m2_frames_dropped_total";
/// `signal` events fanned out, counted once per value (counter).
pub const SIGNALS_BROADCAST_TOTAL: &str = "m2_signals_broadcast_total";
/// Accepted upgrades (counter, labels: role).
pub const CONNECTIONS_TOTAL: &str = "m2_connections_total";
/// Open connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "m2_connections_active";
/// Connections terminated by the liveness sweep (counter).
pub const LIVENESS_TERMINATIONS_TOTAL: &str = "m2_liveness_terminations_total";
/// Commands sent to the device (counter, labels: command).
pub const DEVICE_COMMANDS_TOTAL: &str = "m2_device_commands_total";
/// Outbound messages dropped on a full or closed queue (counter).
pub const SEND_DROPS_TOTAL: &str = "m2_send_drops_total";
/// Device messages in the last rate window (gauge).
pub const DEVICE_RATE: &str = "m2_device_rate";
