//! HTTP routes: upgrade authorization and dispatch, `/health`, `/metrics`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, Extensions, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::connection::Role;
use crate::gateway::GatewayStats;
use crate::health::{self, HealthResponse};
use crate::reactor::ReactorEvent;
use crate::shutdown::ShutdownCoordinator;
use crate::socket;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// Channel into the reactor.
    pub events: mpsc::Sender<ReactorEvent>,
    /// Counters published by the reactor.
    pub stats: Arc<GatewayStats>,
    /// Source of per-socket termination tokens.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl AppState {
    /// Build handler state; session ids start at 1.
    pub fn new(
        config: Arc<GatewayConfig>,
        events: mpsc::Sender<ReactorEvent>,
        stats: Arc<GatewayStats>,
        shutdown: Arc<ShutdownCoordinator>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            config,
            events,
            stats,
            shutdown,
            metrics,
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_session_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Build the Axum router. Every path not claimed by `/health` or `/metrics`
/// is a WebSocket upgrade.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(upgrade_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Whether the presented credential matches the configured secret.
///
/// With no secret configured nothing is authorized.
pub fn authorize(secret: Option<&str>, presented: Option<&str>) -> bool {
    matches!((secret, presented), (Some(secret), Some(presented)) if secret == presented)
}

/// 401 that also ends the HTTP connection, so a rejected client cannot retry
/// on the same socket.
fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, [(header::CONNECTION, "close")]).into_response()
}

/// Any path: authorize, assign a session id, upgrade, dispatch on path.
async fn upgrade_handler(
    State(state): State<AppState>,
    uri: Uri,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    headers: HeaderMap,
    extensions: Extensions,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let remote = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let presented = query
        .as_ref()
        .ok()
        .and_then(|Query(params)| params.get(&state.config.auth_param))
        .map(String::as_str);
    if !authorize(state.config.secret.as_deref(), presented) {
        warn!(path = uri.path(), remote = %remote, "rejecting unauthorized upgrade");
        return unauthorized();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let id = state.next_session_id();
    let role = if state.config.is_device_path(uri.path()) {
        Role::Device
    } else {
        Role::Client
    };
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    info!(
        conn_id = id,
        role = %role,
        path = uri.path(),
        remote = %remote,
        user_agent,
        "upgrading connection"
    );

    let events = state.events.clone();
    let cancel = state.shutdown.child_token();
    let queue_depth = state.config.max_send_queue;
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |upgraded| {
            socket::run_socket(upgraded, id, role, events, cancel, queue_depth)
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, &state.stats))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_state(secret: Option<&str>) -> (AppState, mpsc::Receiver<ReactorEvent>) {
        let config = GatewayConfig {
            secret: secret.map(str::to_string),
            ..GatewayConfig::default()
        };
        let (tx, rx) = mpsc::channel(8);
        let state = AppState::new(
            Arc::new(config),
            tx,
            Arc::new(GatewayStats::default()),
            Arc::new(ShutdownCoordinator::new()),
            None,
        );
        (state, rx)
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    #[test]
    fn authorize_requires_exact_match() {
        assert!(authorize(Some("1234"), Some("1234")));
        assert!(!authorize(Some("1234"), Some("12345")));
        assert!(!authorize(Some("1234"), None));
        assert!(!authorize(Some("1234"), Some("")));
    }

    #[test]
    fn authorize_without_secret_rejects_all() {
        assert!(!authorize(None, None));
        assert!(!authorize(None, Some("")));
        assert!(!authorize(None, Some("anything")));
    }

    #[tokio::test]
    async fn wrong_pin_is_unauthorized() {
        let (state, _rx) = make_state(Some("1234"));
        let app = build_router(state);
        assert_eq!(get_status(app, "/m2device?pin=0000").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unauthorized_response_closes_connection() {
        let (state, _rx) = make_state(Some("1234"));
        let req = Request::builder()
            .uri("/m2device?pin=0000")
            .body(Body::empty())
            .unwrap();
        let resp = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::CONNECTION], "close");
    }

    #[tokio::test]
    async fn missing_pin_is_unauthorized() {
        let (state, _rx) = make_state(Some("1234"));
        assert_eq!(get_status(build_router(state), "/").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn no_secret_is_unauthorized() {
        let (state, _rx) = make_state(None);
        assert_eq!(
            get_status(build_router(state), "/live?pin=").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn authorized_plain_get_is_not_an_upgrade() {
        let (state, mut rx) = make_state(Some("1234"));
        let app = build_router(state.clone());
        let status = get_status(app, "/live?pin=1234").await;
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::UNAUTHORIZED);
        // rejected before any session exists
        assert!(rx.try_recv().is_err());
        assert_eq!(state.next_session_id(), 1);
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (state, _rx) = make_state(None);
        let app = build_router(state);

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["device_online"], false);
        assert!(parsed["connections"].is_number());
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_not_found() {
        let (state, _rx) = make_state(None);
        assert_eq!(get_status(build_router(state), "/metrics").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_renders_prometheus_text() {
        let (mut state, _rx) = make_state(None);
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        state.metrics = Some(recorder.handle());
        let app = build_router(state);

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
