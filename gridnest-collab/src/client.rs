//! Sync client for one layout surface.
//!
//! Provides:
//! - The Idle / ApplyingRemote state machine ([`SurfaceSync`]), pure and
//!   synchronous so it can be driven from tests without a server
//! - HTTP delivery of local edits through a [`PatchTransport`]
//! - Broadcast subscription over WebSocket, with document refresh on mount
//!   and on focus
//!
//! ```text
//!  user op ─► SurfaceSync::apply_local ─► LayoutOp::apply (optimistic)
//!                     │ Idle?
//!                     ▼
//!               Outbound batch ─► PatchTransport ─► server
//!
//!  broadcast ─► SurfaceSync::apply_remote ─► ApplyingRemote ─► render_complete ─► Idle
//! ```
//!
//! Local edits made while ApplyingRemote are applied but never sent, so the
//! server's echo of our own edit cannot bounce back as a new patch.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use gridnest_core::{ConfigDocument, DocumentField, GridPath, LayoutDocument, LayoutError};
use gridnest_layout::{InteractionState, LayoutOp, RendererCell, TargetChanged};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::error::TransportError;
use crate::protocol::{
    BroadcastMessage, PatchBatchRequest, PatchPropRequest, ProtocolError, ResetRequest,
    CONFIG_BATCH_PATH, CONFIG_PATH, DOCUMENT_PATH, RESET_PATH, WS_PATH,
};

/// Reconciliation state of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// A pushed or fetched document is being rendered; local edits are not sent.
    ApplyingRemote,
}

/// Client connection state of the broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A request the surface wants delivered to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Batch {
        surface_id: String,
        updates: Map<String, Value>,
    },
    Prop {
        surface_id: String,
        prop_name: String,
        value: Value,
    },
    Reset(ConfigDocument),
}

/// Events emitted by the sync client.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Broadcast channel open
    Connected,
    /// Broadcast channel closed
    Disconnected,
    /// A pushed or fetched document replaced the local one
    DocumentApplied { changed: bool },
    /// A patch reached the server
    PatchSent,
    /// Delivery failed; the local copy stays as it is
    TransportFailed(String),
}

// ─── State machine ──────────────────────────────────────────────────

/// Local copy of one surface plus its interaction and sync state.
#[derive(Debug, Clone)]
pub struct SurfaceSync {
    surface_id: String,
    props: Map<String, Value>,
    doc: LayoutDocument,
    state: SyncState,
    interaction: InteractionState,
}

impl SurfaceSync {
    pub fn new(surface_id: impl Into<String>) -> Self {
        Self {
            surface_id: surface_id.into(),
            props: Map::new(),
            doc: LayoutDocument::default(),
            state: SyncState::Idle,
            interaction: InteractionState::new(),
        }
    }

    pub fn surface_id(&self) -> &str {
        &self.surface_id
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn document(&self) -> &LayoutDocument {
        &self.doc
    }

    /// Every prop of the surface as last applied, layout fields included.
    pub fn props(&self) -> &Map<String, Value> {
        &self.props
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    /// Apply a local edit. Returns the batch to send, if any.
    pub fn apply_local(&mut self, op: LayoutOp) -> Option<Outbound> {
        if matches!(op, LayoutOp::RendererLayout { .. }) && self.interaction.is_dragging() {
            log::debug!("{}: renderer layout ignored during drag", self.surface_id);
            return None;
        }
        let fields = op.apply(&mut self.doc)?;
        let updates = self.doc.updates(&fields);
        self.props.extend(updates.clone());
        self.outbound(&fields, updates)
    }

    fn outbound(&self, fields: &[DocumentField], updates: Map<String, Value>) -> Option<Outbound> {
        if self.state == SyncState::ApplyingRemote {
            log::warn!(
                "{}: local edit to {fields:?} kept but not sent, remote apply still open",
                self.surface_id
            );
            return None;
        }
        Some(Outbound::Batch {
            surface_id: self.surface_id.clone(),
            updates,
        })
    }

    pub fn drag_start(&mut self, grid: GridPath, item_id: impl Into<String>) {
        self.interaction.begin_drag(grid, item_id);
    }

    pub fn drag_move(&mut self, cells: &[RendererCell]) -> Option<TargetChanged> {
        self.interaction.drag_moved(cells)
    }

    /// Release the drag; combines onto the highlighted target if there is one.
    pub fn drag_stop(&mut self) -> Option<Outbound> {
        let drop = self.interaction.end_drag()?;
        self.apply_local(LayoutOp::Combine {
            grid: drop.grid,
            dragged: drop.dragged_id,
            target: drop.target_id,
        })
    }

    pub fn cancel_drag(&mut self) {
        self.interaction.cancel_drag();
    }

    /// Right-click over `hits`; a double click toggles the innermost grid.
    pub fn right_click(&mut self, hits: &[GridPath], now: Instant) -> Option<Outbound> {
        let grid = self.interaction.right_click(hits, now)?;
        self.apply_local(LayoutOp::ToggleDirection { grid })
    }

    /// Set one prop through the single-field endpoint.
    pub fn set_prop(&mut self, prop_name: &str, value: Value) -> Result<Option<Outbound>, LayoutError> {
        let mut props = self.props.clone();
        props.insert(prop_name.to_string(), value.clone());
        self.doc = LayoutDocument::from_props(&props)?;
        self.props = props;
        if self.state == SyncState::ApplyingRemote {
            log::warn!(
                "{}: local edit to {prop_name} kept but not sent, remote apply still open",
                self.surface_id
            );
            return Ok(None);
        }
        Ok(Some(Outbound::Prop {
            surface_id: self.surface_id.clone(),
            prop_name: prop_name.to_string(),
            value,
        }))
    }

    /// Replace the local copy with the server's. Enters ApplyingRemote; the
    /// renderer calls [`SurfaceSync::finish_remote_apply`] once it has drawn
    /// the result. Returns whether anything differed.
    pub fn apply_remote(&mut self, config: &ConfigDocument) -> Result<bool, TransportError> {
        let component = config
            .component(&self.surface_id)
            .ok_or_else(|| TransportError::MissingSurface(self.surface_id.clone()))?;
        let doc = LayoutDocument::from_props(&component.props)?;

        self.state = SyncState::ApplyingRemote;
        let changed = doc != self.doc || component.props != self.props;
        self.doc = doc;
        self.props = component.props.clone();
        log::debug!("{}: remote document applied (changed: {changed})", self.surface_id);
        Ok(changed)
    }

    pub fn finish_remote_apply(&mut self) {
        self.state = SyncState::Idle;
    }

    /// Adopt `config` locally and return the reset request for it.
    pub fn reset_to(&mut self, config: ConfigDocument) -> Result<Outbound, TransportError> {
        self.apply_remote(&config)?;
        Ok(Outbound::Reset(config))
    }
}

// ─── Transport ──────────────────────────────────────────────────────

/// Delivery of outbound requests and document reads.
pub trait PatchTransport: Send + Sync + 'static {
    fn deliver(&self, outbound: &Outbound) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn fetch_document(&self) -> impl Future<Output = Result<ConfigDocument, TransportError>> + Send;
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `http://host:port` of the config server
    pub base_url: String,
    /// Surface this client edits
    pub surface_id: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, surface_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            surface_id: surface_id.into(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Broadcast channel URL derived from the base URL.
    pub fn ws_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{base}{WS_PATH}")
    }
}

/// [`PatchTransport`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status {
        code: status.as_u16(),
        body,
    })
}

impl PatchTransport for HttpTransport {
    async fn deliver(&self, outbound: &Outbound) -> Result<(), TransportError> {
        let request = match outbound {
            Outbound::Batch {
                surface_id,
                updates,
            } => self
                .http
                .patch(self.config.endpoint(CONFIG_BATCH_PATH))
                .json(&PatchBatchRequest {
                    surface_id: surface_id.clone(),
                    updates: updates.clone(),
                }),
            Outbound::Prop {
                surface_id,
                prop_name,
                value,
            } => self
                .http
                .patch(self.config.endpoint(CONFIG_PATH))
                .json(&PatchPropRequest {
                    surface_id: surface_id.clone(),
                    prop_name: prop_name.clone(),
                    new_value: value.clone(),
                }),
            Outbound::Reset(config) => self
                .http
                .post(self.config.endpoint(RESET_PATH))
                .json(&ResetRequest::reset_config(config)?),
        };
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn fetch_document(&self) -> Result<ConfigDocument, TransportError> {
        let resp = self
            .http
            .get(self.config.endpoint(DOCUMENT_PATH))
            .send()
            .await?;
        Ok(check_status(resp).await?.json::<ConfigDocument>().await?)
    }
}

// ─── Client ─────────────────────────────────────────────────────────

/// Async wrapper around [`SurfaceSync`]: delivers outbound requests and
/// feeds broadcasts back in. Failed deliveries are logged and reported as
/// [`SyncEvent::TransportFailed`], never retried.
pub struct SyncClient<T: PatchTransport = HttpTransport> {
    config: ClientConfig,
    transport: Arc<T>,
    surface: Arc<Mutex<SurfaceSync>>,
    connection: Arc<RwLock<ConnectionState>>,
    patches_sent: Arc<AtomicU64>,
    reader: Mutex<Option<JoinHandle<()>>>,
    event_tx: mpsc::Sender<SyncEvent>,
    event_rx: Option<mpsc::Receiver<SyncEvent>>,
}

impl SyncClient<HttpTransport> {
    /// Client talking HTTP to `config.base_url`.
    pub fn http(config: ClientConfig) -> Self {
        let transport = HttpTransport::new(config.clone());
        Self::new(config, transport)
    }
}

impl<T: PatchTransport> SyncClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            surface: Arc::new(Mutex::new(SurfaceSync::new(config.surface_id.clone()))),
            config,
            transport: Arc::new(transport),
            connection: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            patches_sent: Arc::new(AtomicU64::new(0)),
            reader: Mutex::new(None),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn state(&self) -> SyncState {
        self.surface.lock().await.state()
    }

    pub async fn document(&self) -> LayoutDocument {
        self.surface.lock().await.document().clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection.read().await
    }

    /// Patches successfully delivered so far.
    pub fn patches_sent(&self) -> u64 {
        self.patches_sent.load(Ordering::Relaxed)
    }

    /// Initial load. Leaves the surface in ApplyingRemote: local edits are
    /// not sent until the renderer calls [`SyncClient::render_complete`].
    pub async fn mount(&self) -> Result<bool, TransportError> {
        self.refresh().await
    }

    /// Window regained focus: pushes may have been missed, fetch again.
    /// Like [`SyncClient::mount`], needs a following `render_complete`.
    pub async fn on_focus(&self) -> Result<bool, TransportError> {
        self.refresh().await
    }

    /// Fetch the whole document and apply it as remote. The surface stays
    /// in ApplyingRemote until [`SyncClient::render_complete`].
    pub async fn refresh(&self) -> Result<bool, TransportError> {
        let config = match self.transport.fetch_document().await {
            Ok(config) => config,
            Err(e) => return Err(self.report(e)),
        };
        let changed = self.surface.lock().await.apply_remote(&config)?;
        emit(&self.event_tx, SyncEvent::DocumentApplied { changed });
        Ok(changed)
    }

    /// Apply a local edit and deliver it. `Ok(true)` if a patch was sent.
    pub async fn apply(&self, op: LayoutOp) -> Result<bool, TransportError> {
        let outbound = self.surface.lock().await.apply_local(op);
        self.dispatch(outbound).await
    }

    pub async fn drag_start(&self, grid: GridPath, item_id: impl Into<String>) {
        self.surface.lock().await.drag_start(grid, item_id);
    }

    pub async fn drag_move(&self, cells: &[RendererCell]) -> Option<TargetChanged> {
        self.surface.lock().await.drag_move(cells)
    }

    pub async fn drag_stop(&self) -> Result<bool, TransportError> {
        let outbound = self.surface.lock().await.drag_stop();
        self.dispatch(outbound).await
    }

    pub async fn right_click(&self, hits: &[GridPath], now: Instant) -> Result<bool, TransportError> {
        let outbound = self.surface.lock().await.right_click(hits, now);
        self.dispatch(outbound).await
    }

    pub async fn set_prop(&self, prop_name: &str, value: Value) -> Result<bool, TransportError> {
        let outbound = self.surface.lock().await.set_prop(prop_name, value)?;
        self.dispatch(outbound).await
    }

    /// Replace the server document with `config`, adopting it locally first.
    pub async fn reset_to(&self, config: ConfigDocument) -> Result<bool, TransportError> {
        let outbound = self.surface.lock().await.reset_to(config)?;
        self.dispatch(Some(outbound)).await
    }

    /// Feed one broadcast frame. Frames for other events are ignored.
    pub async fn handle_broadcast(&self, text: &str) -> Result<bool, TransportError> {
        apply_broadcast(&self.surface, &self.event_tx, text).await
    }

    /// The renderer has drawn the last remote document.
    pub async fn render_complete(&self) {
        self.surface.lock().await.finish_remote_apply();
    }

    async fn dispatch(&self, outbound: Option<Outbound>) -> Result<bool, TransportError> {
        let Some(outbound) = outbound else {
            return Ok(false);
        };
        match self.transport.deliver(&outbound).await {
            Ok(()) => {
                self.patches_sent.fetch_add(1, Ordering::Relaxed);
                emit(&self.event_tx, SyncEvent::PatchSent);
                Ok(true)
            }
            Err(e) => Err(self.report(e)),
        }
    }

    fn report(&self, e: TransportError) -> TransportError {
        log::error!("{}: {e}", self.config.surface_id);
        emit(&self.event_tx, SyncEvent::TransportFailed(e.to_string()));
        e
    }

    /// Open the broadcast channel. Spawns a reader task that applies every
    /// config update to the surface.
    pub async fn connect_broadcast(&self) -> Result<(), TransportError> {
        *self.connection.write().await = ConnectionState::Connecting;

        let url = self.config.ws_url();
        let mut ws_stream = match tokio_tungstenite::connect_async(&url).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                *self.connection.write().await = ConnectionState::Disconnected;
                return Err(self.report(e.into()));
            }
        };

        *self.connection.write().await = ConnectionState::Connected;
        emit(&self.event_tx, SyncEvent::Connected);
        log::info!("{}: subscribed to {url}", self.config.surface_id);

        let surface = self.surface.clone();
        let connection = self.connection.clone();
        let event_tx = self.event_tx.clone();
        let surface_id = self.config.surface_id.clone();
        let handle = tokio::spawn(async move {
            while let Some(msg) = ws_stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = apply_broadcast(&surface, &event_tx, text.as_str()).await {
                            log::warn!("{surface_id}: broadcast not applied: {e}");
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("{surface_id}: broadcast channel error: {e}");
                        break;
                    }
                }
            }
            *connection.write().await = ConnectionState::Disconnected;
            emit(&event_tx, SyncEvent::Disconnected);
        });

        if let Some(previous) = self.reader.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Close the broadcast channel.
    pub async fn disconnect(&self) {
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        *self.connection.write().await = ConnectionState::Disconnected;
    }
}

fn emit(tx: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
    // Nobody listening or listener behind: events are informational.
    let _ = tx.try_send(event);
}

async fn apply_broadcast(
    surface: &Mutex<SurfaceSync>,
    events: &mpsc::Sender<SyncEvent>,
    text: &str,
) -> Result<bool, TransportError> {
    let config = match BroadcastMessage::decode(text)?.into_config() {
        Ok(config) => config,
        Err(ProtocolError::UnexpectedEvent(event)) => {
            log::debug!("ignoring broadcast {event}");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };
    let changed = surface.lock().await.apply_remote(&config)?;
    emit(events, SyncEvent::DocumentApplied { changed });
    Ok(changed)
}
