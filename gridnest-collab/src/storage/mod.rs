//! On-disk storage of the project config document.
//!
//! Architecture:
//! ```text
//! ┌─────────────┐   read / mutate / write   ┌──────────────┐
//! │ WriteQueue  │ ────────────────────────► │ DocumentStore│
//! │ (one lane)  │                           │ (JSON file)  │
//! └─────────────┘                           └──────┬───────┘
//!                                                  │ save
//!                                                  ▼
//!                          encode (2-space) ─► re-parse ─► temp file ─► rename
//! ```
//!
//! Every storage call runs under the configured I/O deadline, so a hung disk
//! fails the queued operation instead of wedging the lane.

pub mod file;

pub use file::{DocumentStore, StoreConfig};
