//! `GatewayServer`: Axum HTTP + WebSocket server around the reactor.

use std::net::SocketAddr;
use std::sync::Arc;

use m2_core::SignalDictionary;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::errors::ServerError;
use crate::gateway::{Gateway, GatewayStats};
use crate::reactor::Reactor;
use crate::router::{build_router, AppState};
use crate::shutdown::ShutdownCoordinator;

/// The M2 gateway server.
pub struct GatewayServer {
    config: Arc<GatewayConfig>,
    dictionary: Arc<dyn SignalDictionary>,
    stats: Arc<GatewayStats>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a new server.
    pub fn new(config: GatewayConfig, dictionary: Arc<dyn SignalDictionary>) -> Self {
        Self {
            config: Arc::new(config),
            dictionary,
            stats: Arc::new(GatewayStats::default()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Bind, start the reactor and serve until shutdown.
    pub async fn listen(&self) -> Result<ServerHandle, ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let (events_tx, events_rx) = mpsc::channel(self.config.event_queue);
        let gateway = Gateway::new(
            Arc::clone(&self.config),
            Arc::clone(&self.dictionary),
            Arc::clone(&self.stats),
        );
        let reactor = Reactor::new(
            gateway,
            events_rx,
            self.config.ping_interval,
            self.config.rate_interval,
            self.shutdown.token(),
        );
        let reactor = tokio::spawn(async move {
            let _ = reactor.run().await;
        });

        let router = build_router(AppState::new(
            Arc::clone(&self.config),
            events_tx,
            Arc::clone(&self.stats),
            Arc::clone(&self.shutdown),
            self.metrics.clone(),
        ));

        info!(
            addr = %local_addr,
            device_path = %self.config.device_path,
            "m2 gateway listening"
        );

        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server failed");
            }
        });

        Ok(ServerHandle {
            local_addr,
            tasks: vec![reactor, server],
        })
    }

    /// Counters published by the reactor.
    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Handle returned by [`GatewayServer::listen`].
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Background tasks, for [`ShutdownCoordinator::graceful_shutdown`].
    pub fn into_tasks(self) -> Vec<JoinHandle<()>> {
        self.tasks
    }
}
