//! Settings types with compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Listener and routing.
    pub server: ServerSettings,
    /// Upgrade authorization.
    pub auth: AuthSettings,
    /// Ping/latency circuit breaker.
    pub liveness: LivenessSettings,
    /// Device message rate window.
    pub rate: RateSettings,
    /// Signal dictionary source.
    pub dictionary: DictionarySettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Listener and routing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` auto-assigns).
    pub port: u16,
    /// The one upgrade path that selects the device session.
    pub device_path: String,
    /// Per-connection outbound queue depth.
    pub max_send_queue: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            device_path: "/m2device".to_string(),
            max_send_queue: 1024,
            max_message_size: 64 * 1024,
        }
    }
}

/// Upgrade authorization settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Shared secret. When unset every upgrade is rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Query parameter carrying the credential.
    pub query_param: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret: None,
            query_param: "pin".to_string(),
        }
    }
}

/// Liveness sweep settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LivenessSettings {
    /// Sweep period in milliseconds.
    pub ping_interval_ms: u64,
    /// Latency at or above which a connection is terminated.
    pub unresponsive_latency_ms: u64,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            ping_interval_ms: 1000,
            unresponsive_latency_ms: 4000,
        }
    }
}

/// Rate window settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateSettings {
    /// Prune period in milliseconds.
    pub sweep_interval_ms: u64,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 1000,
            window_ms: 1000,
        }
    }
}

/// Signal dictionary settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DictionarySettings {
    /// Path to the dictionary JSON file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
