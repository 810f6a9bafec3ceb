//! # gridnest-layout - grid editing engines
//!
//! Pure, synchronous operations over a [`gridnest_core::LayoutDocument`]:
//!
//! ```text
//!   renderer drag report ─► overlap::OverlapTracker ─► interaction::InteractionState
//!                                                             │ drop / double right-click
//!                                                             ▼
//!                               ops::LayoutOp::apply ─► engine::{combine, uncombine,
//!                                                                toggle_group, reflow, ...}
//!                                                             │
//!                                                             ▼
//!                                               changed DocumentFields (to sync)
//! ```
//!
//! Stale ids never fail: an operation that no longer applies returns `None`.

pub mod engine;
pub mod interaction;
pub mod ops;
pub mod overlap;

pub use interaction::{DragSession, DropOnItem, InteractionState, RightClickGesture, DOUBLE_CLICK_WINDOW};
pub use ops::{LayoutOp, PADDING_STEP};
pub use overlap::{
    compute_overlap, select_target, CellRect, OverlapTracker, RendererCell, TargetChanged,
    COMBINE_THRESHOLD,
};
