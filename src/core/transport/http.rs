//! HTTP/SSE transport implementation.
//!
//! Serves the MCP HTTP+SSE transport for web-based clients:
//!
//! - `GET <sse path>` opens a session stream. The first event (`endpoint`)
//!   tells the client where to POST its messages; responses come back on the
//!   stream as `message` events.
//! - `POST <messages path>?sessionId=<id>` submits one JSON-RPC message to a
//!   session and returns 202.
//! - `POST <mount path>` is a stateless JSON-RPC endpoint for plain HTTP
//!   clients (curl, scripts).
//!
//! Opening a session also opens the vehicle link, which is what the warm-up
//! probe relies on.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::stream::{self, Stream, StreamExt};
use http::{Request, StatusCode};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, error, info, instrument, warn};
use uuid::Uuid;

use super::rpc::{JsonRpcRequest, JsonRpcResponse, process_request};
use super::{TransportError, TransportResult};
use crate::core::McpServer;
use crate::core::logging::{ACCESS_LOG_TARGET, REQUEST_LOG_TARGET};

// Responses queued per session before POSTs start waiting.
const SESSION_BUFFER: usize = 32;

/// Live SSE sessions keyed by session id.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, mpsc::Sender<JsonRpcResponse>>>>,
}

impl SessionStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::Sender<JsonRpcResponse>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, id: String, sender: mpsc::Sender<JsonRpcResponse>) {
        self.lock().insert(id, sender);
    }

    fn get(&self, id: &str) -> Option<mpsc::Sender<JsonRpcResponse>> {
        self.lock().get(id).cloned()
    }

    fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its session from the store when the SSE stream is dropped.
struct SessionGuard {
    id: String,
    sessions: SessionStore,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        info!(target: REQUEST_LOG_TARGET, "SSE session {} closed", self.id);
    }
}

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    server: Arc<McpServer>,
    sessions: SessionStore,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(server: Arc<McpServer>, shutdown: CancellationToken) -> Self {
        Self {
            server,
            sessions: SessionStore::default(),
            shutdown,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// Build the router for the server's current transport settings.
pub fn router(state: AppState) -> Router {
    let config = state.server.transport().clone();

    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                target: ACCESS_LOG_TARGET,
                "http",
                method = %request.method(),
                path = %request.uri().path(),
            )
        })
        .on_request(())
        .on_response(|response: &Response, latency: Duration, _span: &Span| {
            info!(
                target: ACCESS_LOG_TARGET,
                status = response.status().as_u16(),
                latency_ms = latency.as_millis() as u64,
                "response"
            );
        });

    let mut app = Router::new()
        .route(&config.sse_path(), get(handle_sse))
        .route(&config.messages_path(), post(handle_message))
        .route(config.rpc_path(), post(handle_rpc))
        .route("/health", get(health_check))
        .route("/", get(root_handler))
        .with_state(state)
        .layer(trace);

    // Add CORS if enabled
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// HTTP transport with a bound listener.
pub struct HttpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
    app: Router,
}

impl HttpTransport {
    /// Bind the listener on the server's transport settings.
    ///
    /// The router is built before the listener, so an unroutable endpoint
    /// layout never leaves a bound port behind. Bind failures are fatal for
    /// the process; there is no retry.
    pub async fn bind(server: Arc<McpServer>, shutdown: CancellationToken) -> TransportResult<Self> {
        server
            .transport()
            .validate()
            .map_err(|e| TransportError::http(e.to_string()))?;

        let addr = server.transport().bind_address();
        let app = router(AppState::new(server, shutdown));

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            app,
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the serve loop until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> TransportResult<()> {
        info!("Ready - listening on {} (MCP over HTTP/SSE)", self.local_addr);

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        info!("HTTP transport stopped");
        Ok(())
    }
}

/// Build the `endpoint` event payload for a session.
pub fn endpoint_uri(messages_path: &str, session_id: &str) -> TransportResult<String> {
    let query = serde_urlencoded::to_string([("sessionId", session_id)])
        .map_err(|e| TransportError::http(e.to_string()))?;
    Ok(format!("{messages_path}?{query}"))
}

fn session_stream(
    endpoint: String,
    receiver: mpsc::Receiver<JsonRpcResponse>,
    guard: SessionGuard,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let first = stream::once(async move { Ok(Event::default().event("endpoint").data(endpoint)) });

    let messages = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        loop {
            let Some(response) = receiver.recv().await else {
                return None;
            };
            match serde_json::to_string(&response) {
                Ok(data) => {
                    let event = Event::default().event("message").data(data);
                    return Some((Ok(event), (receiver, guard)));
                }
                Err(e) => warn!("Dropping unserializable response: {}", e),
            }
        }
    });

    first
        .chain(messages)
        .take_until(async move { shutdown.cancelled().await })
}

/// Open an SSE session.
#[instrument(skip_all)]
async fn handle_sse(State(state): State<AppState>) -> Response {
    // First contact opens the vehicle link; failures go to this client.
    if let Err(e) = state.server.ensure_backend().await {
        error!("Vehicle link initialization failed: {}", e);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    let session_id = Uuid::new_v4().simple().to_string();
    let endpoint = match endpoint_uri(&state.server.transport().messages_path(), &session_id) {
        Ok(endpoint) => endpoint,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let (sender, receiver) = mpsc::channel(SESSION_BUFFER);
    state.sessions.insert(session_id.clone(), sender);
    info!(target: REQUEST_LOG_TARGET, "SSE session {} established", session_id);

    let guard = SessionGuard {
        id: session_id,
        sessions: state.sessions.clone(),
    };
    let stream = session_stream(endpoint, receiver, guard, state.shutdown.clone());

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Accept a JSON-RPC message for an SSE session.
#[instrument(skip_all)]
async fn handle_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let Some(sender) = state.sessions.get(&query.session_id) else {
        warn!("Message for unknown session {}", query.session_id);
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };

    // Tool calls may run for a while; answer the POST right away.
    let server = Arc::clone(&state.server);
    tokio::spawn(async move {
        if let Some(response) = process_request(&server, request).await {
            if sender.send(response).await.is_err() {
                warn!("Session closed before the response could be delivered");
            }
        }
    });

    StatusCode::ACCEPTED.into_response()
}

/// Handle a stateless JSON-RPC request.
#[instrument(skip_all)]
async fn handle_rpc(State(state): State<AppState>, Json(request): Json<JsonRpcRequest>) -> Response {
    match process_request(&state.server, request).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Root handler - provides API info.
async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    let transport = state.server.transport();
    Json(serde_json::json!({
        "name": state.server.name(),
        "version": state.server.version(),
        "transport": "HTTP/SSE",
        "endpoints": {
            "sse": transport.sse_path(),
            "messages": transport.messages_path(),
            "rpc": transport.rpc_path(),
            "health": "/health"
        },
        "protocol": "JSON-RPC 2.0",
        "documentation": format!("Open an SSE stream with GET {}", transport.sse_path())
    }))
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let link = if state.server.lifespan().is_ready() {
        "connected"
    } else {
        "idle"
    };

    Json(serde_json::json!({
        "status": "healthy",
        "vehicle_link": link,
        "sessions": state.sessions.len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
