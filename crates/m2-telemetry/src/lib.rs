//! # m2-telemetry
//!
//! Tracing subscriber setup for the gateway binary: an [`EnvFilter`] built
//! from configured levels (`RUST_LOG` wins when set) and a stdout formatting
//! layer that emits either JSON lines or human-readable output.

#![deny(unsafe_code)]

use std::fmt::Write as _;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by `RUST_LOG` env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. `"m2_server" => DEBUG`).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Config at the given level name, falling back to `INFO` if unparseable.
    pub fn with_level_name(name: &str, json: bool) -> Self {
        Self {
            log_level: parse_level(name).unwrap_or(Level::INFO),
            module_levels: Vec::new(),
            json,
        }
    }
}

/// Parse a level name (`trace`, `debug`, `info`, `warn`, `error`).
pub fn parse_level(name: &str) -> Option<Level> {
    name.trim().parse().ok()
}

/// Directive string for the configured levels, e.g. `info,m2_server=debug`.
pub fn build_filter_string(config: &TelemetryConfig) -> String {
    let mut filter = config.log_level.to_string().to_lowercase();
    for (module, level) in &config.module_levels {
        let _ = write!(filter, ",{module}={}", level.to_string().to_lowercase());
    }
    filter
}

/// Initialize the global tracing subscriber. Call once at startup.
///
/// A second call is ignored.
pub fn init_telemetry(config: &TelemetryConfig) {
    let filter_str = build_filter_string(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(env_filter)
            .boxed()
    };

    if let Err(e) = tracing_subscriber::registry().with(fmt_layer).try_init() {
        eprintln!("m2-telemetry: subscriber already installed: {e}");
    }
}
