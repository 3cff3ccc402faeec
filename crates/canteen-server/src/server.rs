//! `CanteenServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use canteen_core::{ConnectionId, Namespace};
use canteen_platform::push::PushFallbackNotifier;
use chrono::{DateTime, Utc};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_REJECTED_TOTAL;
use crate::push::{PushRequest, spawn_push_worker};
use crate::rest;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{SessionContext, run_ws_session};
use crate::websocket::{BusMessage, Dispatcher, EventBus, EventPublisher, HubStats, spawn_reactor};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bus to the reactor.
    pub publisher: Arc<dyn EventPublisher>,
    /// Push fallback notifier (and its subscription store).
    pub notifier: Arc<PushFallbackNotifier>,
    /// Counters published by the reactor.
    pub stats: Arc<HubStats>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// One permit per allowed concurrent WebSocket connection.
    pub connection_slots: Arc<Semaphore>,
    /// Server-wide shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Wall-clock start time, reported by `/health`.
    pub started_at: DateTime<Utc>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// Receivers the background workers consume, taken once by
/// [`CanteenServer::spawn_workers`].
struct PendingWorkers {
    bus_rx: mpsc::Receiver<BusMessage>,
    push_tx: mpsc::Sender<PushRequest>,
    push_rx: mpsc::Receiver<PushRequest>,
}

/// The canteen notification server.
pub struct CanteenServer {
    state: AppState,
    pending: Mutex<Option<PendingWorkers>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CanteenServer {
    /// Create a new server. Nothing runs until [`Self::listen`] or
    /// [`Self::spawn_workers`] is called.
    pub fn new(
        config: ServerConfig,
        notifier: PushFallbackNotifier,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let (bus, bus_rx) = EventBus::channel(config.bus_capacity);
        let (push_tx, push_rx) = mpsc::channel(config.bus_capacity.max(1));
        let state = AppState {
            publisher: Arc::new(bus),
            notifier: Arc::new(notifier),
            stats: Arc::new(HubStats::new()),
            connection_slots: Arc::new(Semaphore::new(config.max_connections)),
            config: Arc::new(config),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            started_at: Utc::now(),
            metrics,
        };
        Self {
            state,
            pending: Mutex::new(Some(PendingWorkers {
                bus_rx,
                push_tx,
                push_rx,
            })),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the reactor and the push worker. Calling it again is a no-op.
    pub fn spawn_workers(&self) {
        let Some(pending) = self.pending.lock().take() else {
            return;
        };
        let dispatcher = Dispatcher::new(
            pending.push_tx,
            Arc::clone(&self.state.stats),
            self.state.config.push_title.clone(),
            self.state.config.max_dropped_messages,
        );
        let token = self.state.shutdown.token();
        let reactor = spawn_reactor(dispatcher, pending.bus_rx, token.clone());
        let push = spawn_push_worker(Arc::clone(&self.state.notifier), pending.push_rx, token);
        self.handles.lock().extend([reactor, push]);
    }

    /// Bind the listener and start serving. Returns the bound address.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let bind = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&bind).await?;
        let addr = listener.local_addr()?;

        self.spawn_workers();

        let app = self.router();
        let token = self.state.shutdown.token();
        let serve = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server failed");
            }
        });
        self.handles.lock().push(serve);

        info!(%addr, "canteen server listening");
        Ok(addr)
    }

    /// Cancel everything and wait for the background tasks to finish.
    pub async fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        self.state.shutdown.graceful_shutdown(handles, None).await;
        info!("canteen server stopped");
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the shutdown coordinator.
    pub fn shutdown_coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

/// Build the router for `state`.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route(Namespace::Kitchen.path(), get(kitchen_ws_handler))
        .route(Namespace::Users.path(), get(users_ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", rest::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim_end_matches('/')).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// GET /kitchen
async fn kitchen_ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    upgrade(Namespace::Kitchen, ws, &headers, state)
}

/// GET /users
async fn users_ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    upgrade(Namespace::Users, ws, &headers, state)
}

/// Check origin and capacity, then hand the socket to a session.
fn upgrade(namespace: Namespace, ws: WebSocketUpgrade, headers: &HeaderMap, state: AppState) -> Response {
    if let Some(origin) = headers.get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .is_ok_and(|o| state.config.origin_allowed(o));
        if !allowed {
            counter!(WS_REJECTED_TOTAL, "reason" => "origin").increment(1);
            warn!(namespace = %namespace, origin = ?origin, "websocket origin rejected");
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }
    }

    if state.shutdown.is_shutting_down() {
        counter!(WS_REJECTED_TOTAL, "reason" => "shutdown").increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let Ok(permit) = Arc::clone(&state.connection_slots).try_acquire_owned() else {
        counter!(WS_REJECTED_TOTAL, "reason" => "capacity").increment(1);
        warn!(
            namespace = %namespace,
            max_connections = state.config.max_connections,
            "connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let ctx = SessionContext {
        publisher: Arc::clone(&state.publisher),
        config: Arc::clone(&state.config),
        shutdown: state.shutdown.token(),
    };
    let id = ConnectionId::new();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, namespace, id, ctx, permit))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.started_at,
        state.stats.snapshot(),
        state.notifier.is_enabled(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(ref handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(handle),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
