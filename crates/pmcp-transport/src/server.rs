//! SSE transport server using Axum.
//!
//! Clients open a long-lived event stream with `GET /sse` and send JSON-RPC
//! requests with `POST /message`. A POST that names a connection (header
//! `x-connection-id` or query `connectionId`) has its response pushed onto
//! that stream; anything else is answered per the [`UnroutedPolicy`].

use std::any::Any;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response, sse::Sse},
    routing::{get, post},
};
use pmcp_protocol::{
    EnvelopeError, HandlerResult, McpResponse, PROTOCOL_VERSION, RequestContext, RpcMessage,
    parse_message,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::connection::{Connection, Frame, generate_connection_id};
use crate::delivery::{Delivery, DeliveryError, DeliveryRouter, UnroutedPolicy};
use crate::registry::ConnectionRegistry;

/// Header a POST uses to name its target stream.
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// Interval between keep-alive comments on an idle stream.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub const SSE_PATHS: [&str; 2] = ["/sse", "/mcp/sse"];
pub const MESSAGE_PATHS: [&str; 3] = ["/message", "/mcp", "/mcp/message"];
pub const HEALTH_PATH: &str = "/health";

/// Trait implemented by the MCP server to handle incoming requests.
/// The transport calls this for every envelope that passed validation,
/// notifications included; their results are discarded.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;

    /// Tool names reported by the health endpoint.
    fn tool_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Server identity reported by the index endpoint.
    fn server_info(&self) -> Value {
        Value::Null
    }
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Maximum concurrent streams
    pub max_connections: Option<usize>,
    /// Where responses without a target connection go
    pub unrouted: UnroutedPolicy,
    pub keepalive_interval: Duration,
    /// Include panic details in 500 bodies
    pub dev_mode: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "127.0.0.1".into(),
            enable_cors: false,
            max_connections: None,
            unrouted: UnroutedPolicy::default(),
            keepalive_interval: KEEPALIVE_INTERVAL,
            dev_mode: false,
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: RequestHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    registry: Arc<ConnectionRegistry>,
    router: DeliveryRouter,
    started_at: Instant,
}

/// Build the HTTP surface without binding a socket.
pub fn build_router<H: RequestHandler>(
    config: TransportConfig,
    handler: Arc<H>,
    registry: Arc<ConnectionRegistry>,
) -> Router {
    let enable_cors = config.enable_cors;
    let dev_mode = config.dev_mode;
    let state = Arc::new(AppState {
        handler,
        router: DeliveryRouter::new(registry.clone(), config.unrouted),
        config,
        registry,
        started_at: Instant::now(),
    });

    let mut app = Router::new().route("/", get(index_handler::<H>));
    for path in SSE_PATHS {
        app = app.route(path, get(sse_handler::<H>));
    }
    for path in MESSAGE_PATHS {
        app = app.route(path, post(message_handler::<H>));
    }
    let mut app = app
        .route(HEALTH_PATH, get(health_handler::<H>))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_responder(dev_mode)))
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// The transport server. Owns the listener task and the connection registry.
pub struct TransportServer {
    registry: Arc<ConnectionRegistry>,
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Bind and start serving with the given request handler.
    pub async fn start<H: RequestHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, std::io::Error> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let registry = Arc::new(ConnectionRegistry::new());

        let listener =
            tokio::net::TcpListener::bind((config.hostname.as_str(), config.port)).await?;
        let actual_port = listener.local_addr()?.port();
        info!(
            "MCP transport listening on http://{}:{}{}",
            config.hostname, actual_port, SSE_PATHS[0]
        );

        let app = build_router(config, handler, registry.clone());
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
            {
                error!("Transport server error: {e}");
            }
        });

        Ok(Self {
            registry,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Close every open stream, then stop accepting and wait for in-flight requests.
    pub async fn stop(&mut self) {
        self.registry.close_all();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("MCP transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn sse_handler<H: RequestHandler>(State(state): State<Arc<AppState<H>>>) -> Response {
    if state.registry.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
    }
    if let Some(max) = state.config.max_connections {
        if state.registry.count() >= max {
            warn!("Stream rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    let id = generate_connection_id();
    let (conn, rx) = Connection::new(id.clone());

    // Queued before registration so nothing can overtake it.
    let greeting = Frame::System(json!({
        "type": "connected",
        "connectionId": id,
        "messageEndpoint": format!("{}?connectionId={id}", MESSAGE_PATHS[0]),
    }));
    if conn.try_send(greeting).is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    state.registry.register(conn.clone());
    tokio::spawn(run_keepalive(
        conn.clone(),
        state.registry.clone(),
        state.config.keepalive_interval,
    ));

    let guard = StreamGuard {
        registry: state.registry.clone(),
        conn,
        draining: false,
    };
    let stream = futures_util::stream::unfold((rx, guard), |(mut rx, mut guard)| async move {
        let frame = if guard.draining {
            rx.try_recv().ok()
        } else {
            tokio::select! {
                biased;
                _ = guard.conn.close_requested() => {
                    // Flush what was already routed here before ending.
                    guard.draining = true;
                    rx.try_recv().ok()
                }
                frame = rx.recv() => frame,
            }
        };
        frame.map(|f| (Ok::<_, Infallible>(f.into_event()), (rx, guard)))
    });

    let mut response = Sse::new(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    if let Ok(value) = HeaderValue::from_str(&id) {
        headers.insert(CONNECTION_ID_HEADER, value);
    }
    response
}

#[derive(Debug, Default, Deserialize)]
struct MessageQuery {
    #[serde(rename = "connectionId", alias = "sessionId")]
    connection_id: Option<String>,
}

async fn message_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = connection_target(&headers, query);

    let message = match parse_message(&body) {
        Ok(message) => message,
        Err(err @ EnvelopeError::Parse(_)) => {
            warn!("Rejected request body: {err}");
            return (StatusCode::BAD_REQUEST, Json(err.into_response())).into_response();
        }
        Err(err) => {
            warn!("Rejected request: {err}");
            let delivery = state.router.deliver(Some(err.into_response()), target.as_deref()).await;
            return finish(delivery);
        }
    };

    // Resolve the stream before doing any work for it.
    let connection = match target.as_deref() {
        Some(id) => match state.registry.get(id) {
            Some(conn) => Some(conn),
            None => {
                warn!("Request for unknown connection: {id}");
                return finish(Err(DeliveryError::UnknownConnection(id.to_string())));
            }
        },
        None => None,
    };
    let ctx = connection
        .as_ref()
        .map(|c| c.context())
        .unwrap_or_else(RequestContext::stateless);

    debug!(method = %message.method, connection = ?target, "Dispatching request");
    let response = match &connection {
        Some(conn) => {
            tokio::select! {
                response = process_message(state.handler.as_ref(), message, &ctx) => response,
                _ = conn.closed() => {
                    warn!("Stream {} closed mid-request, abandoning dispatch", conn.id);
                    return finish(Err(DeliveryError::ConnectionClosed(conn.id.clone())));
                }
            }
        }
        None => process_message(state.handler.as_ref(), message, &ctx).await,
    };

    match state.router.deliver(response, target.as_deref()).await {
        // It was there when the request arrived.
        Err(DeliveryError::UnknownConnection(id)) if connection.is_some() => {
            finish(Err(DeliveryError::ConnectionClosed(id)))
        }
        other => finish(other),
    }
}

async fn health_handler<H: RequestHandler>(State(state): State<Arc<AppState<H>>>) -> Response {
    let streams: Vec<Value> = state
        .registry
        .all()
        .iter()
        .map(|c| {
            json!({
                "connectionId": c.id,
                "connectedSeconds": c.connected_at.elapsed().as_secs(),
                "idleSeconds": c.last_activity().elapsed().as_secs(),
            })
        })
        .collect();
    Json(json!({
        "status": "ok",
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "connections": state.registry.count(),
        "streams": streams,
        "tools": state.handler.tool_names(),
        "endpoints": endpoint_catalog(),
        "unroutedPolicy": state.router.policy().as_str(),
    }))
    .into_response()
}

async fn index_handler<H: RequestHandler>(State(state): State<Arc<AppState<H>>>) -> Response {
    Json(json!({
        "server": state.handler.server_info(),
        "protocolVersion": PROTOCOL_VERSION,
        "transport": "sse",
        "endpoints": endpoint_catalog(),
    }))
    .into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Ends the session when the stream is dropped, however that happens.
struct StreamGuard {
    registry: Arc<ConnectionRegistry>,
    conn: Arc<Connection>,
    draining: bool,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        debug!("Stream ended: {}", self.conn.id);
        self.registry.release(&self.conn);
    }
}

async fn run_keepalive(conn: Arc<Connection>, registry: Arc<ConnectionRegistry>, every: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !conn.is_connected() {
                    break;
                }
                match conn.try_send(Frame::KeepAlive(chrono::Utc::now().timestamp_millis())) {
                    Ok(true) => {}
                    Ok(false) => debug!("Keep-alive skipped for {}: queue full", conn.id),
                    Err(e) => {
                        debug!("Keep-alive failed: {e}");
                        break;
                    }
                }
            }
            _ = conn.closed() => break,
        }
    }
    registry.release(&conn);
}

/// Header wins over query.
fn connection_target(headers: &HeaderMap, query: MessageQuery) -> Option<String> {
    headers
        .get(CONNECTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.connection_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Run a validated message through the handler. Notifications yield nothing.
async fn process_message<H: RequestHandler>(
    handler: &H,
    message: RpcMessage,
    ctx: &RequestContext,
) -> Option<McpResponse> {
    let RpcMessage {
        id, method, params, ..
    } = message;
    let result = handler.handle_request(&method, params, ctx).await;

    match id {
        Some(id) => {
            if let Err(e) = &result {
                debug!(%method, "Request failed: {e}");
            }
            Some(McpResponse::from_result(id, result))
        }
        None => {
            if let Err(e) = result {
                debug!(%method, "Notification failed: {e}");
            }
            None
        }
    }
}

fn finish(delivery: Result<Delivery, DeliveryError>) -> Response {
    if let Err(e) = &delivery {
        warn!("Delivery failed: {e}");
    }
    delivery.into_response()
}

fn endpoint_catalog() -> Value {
    json!({
        "sse": SSE_PATHS,
        "message": MESSAGE_PATHS,
        "health": HEALTH_PATH,
    })
}

fn panic_responder(
    dev_mode: bool,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone + Send + Sync + 'static {
    move |panic: Box<dyn Any + Send + 'static>| {
        let detail = panic
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("Handler panicked: {detail}");

        let mut body = json!({ "error": "Internal server error" });
        if dev_mode {
            body["details"] = Value::String(detail);
        }
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
