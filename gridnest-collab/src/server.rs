//! HTTP + WebSocket config server.
//!
//! Architecture:
//! ```text
//! Client A ──PATCH──┐
//!                   ├── axum router ── ConfigStore ── WriteQueue (single lane)
//! Client B ──POST───┘        │                              │
//!                            │                     load → edit → save
//!                            │                              │
//!                   GET /.liveedit.config.json        BroadcastGroup
//!                                                           │
//!                                        ┌──────────────────┼──────────────┐
//!                                        ▼                  ▼              ▼
//!                                    Client A           Client B       Client C
//! ```
//!
//! Writes go through the store's queue, reads go straight to disk. Every
//! committed write is pushed to every WebSocket subscriber, including the
//! one whose request caused it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use gridnest_core::ConfigDocument;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::broadcast::{BroadcastGroup, BroadcastStats, SubscriberInfo};
use crate::error::StoreError;
use crate::protocol::{
    ErrorResponse, PatchBatchRequest, PatchPropRequest, ResetRequest, SuccessResponse,
    CONFIG_BATCH_PATH, CONFIG_PATH, DOCUMENT_PATH, RESET_ACTION, RESET_PATH, WS_PATH,
};
use crate::storage::StoreConfig;
use crate::store::ConfigStore;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Config document location and I/O deadline
    pub store: StoreConfig,
    /// Broadcast channel capacity
    pub broadcast_capacity: usize,
    /// Allowed CORS origins (empty = any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5174".to_string(),
            store: StoreConfig::default(),
            broadcast_capacity: 256,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Config for tests: given address and document path.
    pub fn for_testing(bind_addr: impl Into<String>, path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            store: StoreConfig::for_testing(path),
            broadcast_capacity: 64,
            cors_origins: Vec::new(),
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub committed_writes: u64,
    pub rejected_writes: u64,
    pub broadcast: BroadcastStats,
}

struct AtomicServerStats {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
}

#[derive(Clone)]
struct AppState {
    store: Arc<ConfigStore>,
    broadcast: Arc<BroadcastGroup>,
    stats: Arc<AtomicServerStats>,
}

impl AppState {
    fn request(&self) {
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn fail(&self, status: StatusCode, error: impl ToString) -> Response {
        self.stats.failed_requests.fetch_add(1, Ordering::Relaxed);
        let error = error.to_string();
        log::warn!("request failed with {status}: {error}");
        (status, Json(ErrorResponse::new(error))).into_response()
    }

    fn finish(&self, result: Result<ConfigDocument, StoreError>) -> Response {
        match result {
            Ok(_) => (StatusCode::OK, Json(SuccessResponse::ok())).into_response(),
            Err(e) => self.fail(StatusCode::INTERNAL_SERVER_ERROR, e),
        }
    }
}

/// The config server.
pub struct SyncServer {
    config: ServerConfig,
    store: Arc<ConfigStore>,
    broadcast: Arc<BroadcastGroup>,
    stats: Arc<AtomicServerStats>,
}

impl SyncServer {
    /// Create the server and start its write lane. Call from an async runtime.
    pub fn new(config: ServerConfig) -> Self {
        let broadcast = Arc::new(BroadcastGroup::new(config.broadcast_capacity));
        let store = Arc::new(ConfigStore::open(config.store.clone(), broadcast.clone()));
        Self {
            config,
            store,
            broadcast,
            stats: Arc::new(AtomicServerStats {
                total_requests: AtomicU64::new(0),
                failed_requests: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Routes, shared state and CORS.
    pub fn router(&self) -> Router {
        let state = AppState {
            store: self.store.clone(),
            broadcast: self.broadcast.clone(),
            stats: self.stats.clone(),
        };

        Router::new()
            .route(CONFIG_PATH, patch(patch_config))
            .route(CONFIG_BATCH_PATH, patch(patch_batch))
            .route(RESET_PATH, post(reset_config))
            .route(DOCUMENT_PATH, get(get_document))
            .route(WS_PATH, get(ws_handler))
            .layer(self.cors_layer())
            .with_state(state)
    }

    fn cors_layer(&self) -> CorsLayer {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::PATCH, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
        if self.config.cors_origins.is_empty() {
            return cors.allow_origin(Any);
        }
        let origins: Vec<HeaderValue> = self
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("ignoring invalid CORS origin {origin:?}");
                    None
                }
            })
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }

    /// Bind and serve until the process ends.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        log::info!(
            "Config server listening on http://{} (document {})",
            listener.local_addr()?,
            self.config.store.path.display()
        );
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }

    pub async fn stats(&self) -> ServerStats {
        let queue = self.store.queue_stats();
        ServerStats {
            total_requests: self.stats.total_requests.load(Ordering::Relaxed),
            failed_requests: self.stats.failed_requests.load(Ordering::Relaxed),
            committed_writes: queue.committed,
            rejected_writes: queue.rejected,
            broadcast: self.broadcast.stats().await,
        }
    }
}

// ─── Handlers ───────────────────────────────────────────────────────

async fn patch_config(State(state): State<AppState>, body: Bytes) -> Response {
    state.request();
    let req: PatchPropRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return state.fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    let result = state
        .store
        .patch_prop(&req.surface_id, &req.prop_name, req.new_value)
        .await;
    state.finish(result)
}

async fn patch_batch(State(state): State<AppState>, body: Bytes) -> Response {
    state.request();
    let req: PatchBatchRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return state.fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    let result = state.store.patch_batch(&req.surface_id, req.updates).await;
    state.finish(result)
}

async fn reset_config(State(state): State<AppState>, body: Bytes) -> Response {
    state.request();
    let req: ResetRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return state.fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    if req.action != RESET_ACTION {
        return state.fail(StatusCode::BAD_REQUEST, "Unknown action");
    }
    let doc: ConfigDocument = match serde_json::from_value(req.config) {
        Ok(doc) => doc,
        Err(e) => return state.fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    let result = state.store.reset(doc).await;
    state.finish(result)
}

async fn get_document(State(state): State<AppState>) -> Response {
    state.request();
    match state.store.read_raw().await {
        Ok(raw) => ([(header::CONTENT_TYPE, "application/json")], raw).into_response(),
        Err(e @ StoreError::NotFound(_)) => state.fail(StatusCode::NOT_FOUND, e),
        Err(e) => state.fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Push committed documents to one subscriber until either side closes.
/// Inbound frames other than close are ignored.
async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let info = SubscriberInfo::new(Some(addr));
    let subscriber_id = info.subscriber_id;
    let mut rx = state.broadcast.add_subscriber(info).await;
    log::info!(
        "Subscriber {subscriber_id} connected from {addr} ({} active)",
        state.broadcast.subscriber_count().await
    );

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text.as_str().to_owned().into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Subscriber {subscriber_id} lagged, skipped {skipped} updates");
                    state.broadcast.record_lag(skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    if let Some(info) = state.broadcast.remove_subscriber(&subscriber_id).await {
        log::info!(
            "Subscriber {subscriber_id} ({}) disconnected after {:?}",
            info.remote_addr.map_or_else(|| "unknown".to_string(), |a| a.to_string()),
            info.connected_at.elapsed()
        );
    }
}
