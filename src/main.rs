//! # m2-gateway
//!
//! Gateway binary: loads settings and the signal dictionary, initializes
//! telemetry and metrics, and serves the device and client WebSockets until
//! Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use m2_core::JsonDictionary;
use m2_server::metrics::install_recorder;
use m2_server::{GatewayConfig, GatewayServer};
use m2_settings::GatewaySettings;
use m2_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{info, warn};

/// WebSocket gateway between an M2 CAN transceiver and live-data clients.
#[derive(Parser, Debug)]
#[command(name = "m2-gateway", about = "M2 CAN WebSocket gateway")]
struct Cli {
    /// Settings file (defaults to `~/.m2/gateway.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Signal dictionary JSON (overrides settings).
    #[arg(long)]
    dictionary: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, settings: &mut GatewaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = &self.dictionary {
            settings.dictionary.path = Some(path.display().to_string());
        }
    }
}

fn gateway_config(settings: &GatewaySettings) -> GatewayConfig {
    GatewayConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        device_path: settings.server.device_path.clone(),
        auth_param: settings.auth.query_param.clone(),
        secret: settings.auth.secret.clone(),
        ping_interval: Duration::from_millis(settings.liveness.ping_interval_ms),
        unresponsive_latency: Duration::from_millis(settings.liveness.unresponsive_latency_ms),
        rate_interval: Duration::from_millis(settings.rate.sweep_interval_ms),
        rate_window: Duration::from_millis(settings.rate.window_ms),
        max_send_queue: settings.server.max_send_queue,
        max_message_size: settings.server.max_message_size,
        ..GatewayConfig::default()
    }
}

fn load_dictionary(path: Option<&str>) -> Result<JsonDictionary> {
    let Some(path) = path else {
        warn!("no signal dictionary configured, every frame will be dropped");
        return Ok(JsonDictionary::empty());
    };
    let dictionary = JsonDictionary::load(Path::new(path))
        .with_context(|| format!("Failed to load signal dictionary: {path}"))?;
    info!(
        path,
        messages = dictionary.message_count(),
        signals = dictionary.signal_count(),
        "signal dictionary loaded"
    );
    Ok(dictionary)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => m2_settings::load_settings_from_path(path),
        None => m2_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    cli.apply(&mut settings);

    init_telemetry(&TelemetryConfig::with_level_name(
        &settings.logging.level,
        settings.logging.json,
    ));
    info!("starting m2 gateway");

    if settings.auth.secret.is_none() {
        warn!("no authorization secret configured (M2_AUTHORIZATION), every upgrade will be rejected");
    }

    let dictionary = load_dictionary(settings.dictionary.path.as_deref())?;
    let mut server = GatewayServer::new(gateway_config(&settings), Arc::new(dictionary));
    match install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let handle = server.listen().await.context("Failed to start gateway")?;
    info!(addr = %handle.local_addr(), "m2 gateway ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    info!("shutting down");
    server
        .shutdown()
        .graceful_shutdown(handle.into_tasks(), None)
        .await;
    Ok(())
}
