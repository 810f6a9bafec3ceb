//! # gridnest-collab - config server and sync client for nested grids
//!
//! One JSON document per project holds every layout surface. Clients edit
//! optimistically and send whole field values; the server serialises writes
//! and pushes the full document back to everyone.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   PATCH / POST (JSON)   ┌──────────────┐
//! │ SyncClient   │ ──────────────────────► │ SyncServer   │
//! │ (per surface)│                         │ (axum)       │
//! └──────┬───────┘ ◄── ws config-update ── └──────┬───────┘
//!        │                                        │
//!        ▼                                        ▼
//! ┌──────────────┐                         ┌──────────────┐
//! │ SurfaceSync  │                         │ ConfigStore  │
//! │ Idle /       │                         │ WriteQueue   │
//! │ ApplyingRemote                         │ (one lane)   │
//! └──────────────┘                         └──────┬───────┘
//!                                                 │
//!                                   ┌─────────────┴─────────────┐
//!                                   ▼                           ▼
//!                             DocumentStore              BroadcastGroup
//!                             (JSON file)                (fan-out)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - JSON request bodies, responses and the broadcast message
//! - [`broadcast`] - fan-out of committed documents
//! - [`storage`] - file backend with round-trip guard and I/O deadline
//! - [`queue`] - single-lane read-modify-write queue
//! - [`store`] - patch, batch and reset operations
//! - [`server`] - HTTP + WebSocket server
//! - [`client`] - per-surface sync state machine and transports

pub mod broadcast;
pub mod client;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod storage;
pub mod store;

// Re-exports for convenience
pub use broadcast::{BroadcastGroup, BroadcastStats, SubscriberInfo};
pub use client::{
    ClientConfig, ConnectionState, HttpTransport, Outbound, PatchTransport, SurfaceSync,
    SyncClient, SyncEvent, SyncState,
};
pub use error::{StoreError, TransportError};
pub use protocol::{
    BroadcastMessage, ErrorResponse, PatchBatchRequest, PatchPropRequest, ProtocolError,
    ResetRequest, SuccessResponse,
};
pub use queue::{Mutation, QueueStats, WriteQueue};
pub use server::{ServerConfig, ServerStats, SyncServer};
pub use storage::{DocumentStore, StoreConfig};
pub use store::{sanitize_prop, ConfigStore};
