//! Gateway runtime configuration.

use std::time::Duration;

/// Configuration for the gateway server and reactor.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Upgrade path selecting the device session.
    pub device_path: String,
    /// Query parameter carrying the credential.
    pub auth_param: String,
    /// Shared secret. `None` rejects every upgrade.
    pub secret: Option<String>,
    /// Liveness sweep period.
    pub ping_interval: Duration,
    /// Latency at or above which a connection is terminated.
    pub unresponsive_latency: Duration,
    /// Rate window prune period.
    pub rate_interval: Duration,
    /// Rate window length.
    pub rate_window: Duration,
    /// Per-connection outbound queue depth.
    pub max_send_queue: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Socket task -> reactor channel depth.
    pub event_queue: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            device_path: "/m2device".into(),
            auth_param: "pin".into(),
            secret: None,
            ping_interval: Duration::from_millis(1000),
            unresponsive_latency: Duration::from_millis(4000),
            rate_interval: Duration::from_millis(1000),
            rate_window: Duration::from_millis(1000),
            max_send_queue: 1024,
            max_message_size: 64 * 1024,
            event_queue: 4096,
        }
    }
}

impl GatewayConfig {
    /// `host:port` bind string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether an upgrade path selects the device session.
    pub fn is_device_path(&self, path: &str) -> bool {
        path == self.device_path
    }
}
