use std::time::Duration;

use gridnest_core::LayoutError;
use thiserror::Error;

use crate::protocol::ProtocolError;

/// Failures of the config store and its write queue.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Component not found: {0}")]
    UnknownSurface(String),
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),
    #[error("Invalid JSON generated: {0}")]
    RoundTrip(String),
    #[error("Config document is not valid JSON: {0}")]
    Corrupt(String),
    #[error("Config document not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{op} timed out after {limit:?}")]
    Timeout { op: &'static str, limit: Duration },
    #[error("Write queue closed")]
    QueueClosed,
}

impl StoreError {
    /// Rejected before any mutation was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::UnknownSurface(_) | StoreError::InvalidPatch(_))
    }
}

/// Client-side delivery failures. Logged, never retried.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Surface not in document: {0}")]
    MissingSurface(String),
    #[error("Invalid layout: {0}")]
    Layout(#[from] LayoutError),
}
