//! Per-surface pointer state: the drag in progress and the double
//! right-click gesture.
//!
//! Nothing here reads a clock. Callers pass the event time, which keeps the
//! gesture window testable without sleeping.

use std::time::{Duration, Instant};

use gridnest_core::GridPath;

use crate::overlap::{OverlapTracker, RendererCell, TargetChanged};

/// Inactivity after which a pending right-click no longer counts.
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(500);
/// Right-clicks needed to fire a toggle.
pub const CLICKS_TO_TOGGLE: u32 = 2;

/// A drag inside one grid.
#[derive(Clone, Debug)]
pub struct DragSession {
    pub grid: GridPath,
    pub dragged_id: String,
    tracker: OverlapTracker,
}

impl DragSession {
    pub fn target(&self) -> Option<&str> {
        self.tracker.current()
    }
}

/// Outcome of releasing a drag over a combine target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropOnItem {
    pub grid: GridPath,
    pub dragged_id: String,
    pub target_id: String,
}

/// Counts right-clicks on one grid within [`DOUBLE_CLICK_WINDOW`].
#[derive(Clone, Debug)]
pub struct RightClickGesture {
    window: Duration,
    count: u32,
    last_at: Option<Instant>,
    target: Option<GridPath>,
}

impl Default for RightClickGesture {
    fn default() -> Self {
        Self::with_window(DOUBLE_CLICK_WINDOW)
    }
}

impl RightClickGesture {
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            count: 0,
            last_at: None,
            target: None,
        }
    }

    /// Register one right-click on `grid` at `now`. Returns `true` when this
    /// click completes a double click; the count is then cleared so a third
    /// click starts over.
    pub fn register(&mut self, grid: &GridPath, now: Instant) -> bool {
        let expired = self
            .last_at
            .map_or(true, |last| now.saturating_duration_since(last) > self.window);
        if expired || self.target.as_ref() != Some(grid) {
            self.count = 0;
        }

        self.count += 1;
        self.last_at = Some(now);
        self.target = Some(grid.clone());

        if self.count >= CLICKS_TO_TOGGLE {
            self.reset();
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_at = None;
        self.target = None;
    }
}

/// Transient interaction state of one surface.
#[derive(Clone, Debug, Default)]
pub struct InteractionState {
    drag: Option<DragSession>,
    right_click: RightClickGesture,
}

impl InteractionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    /// Start dragging `dragged_id` inside `grid`, dropping any stale session.
    pub fn begin_drag(&mut self, grid: GridPath, dragged_id: impl Into<String>) {
        let dragged_id = dragged_id.into();
        log::debug!("drag start {dragged_id} in {grid}");
        self.drag = Some(DragSession {
            grid,
            dragged_id,
            tracker: OverlapTracker::new(),
        });
    }

    /// Feed a live renderer report. `Some` when the highlighted target
    /// changed.
    pub fn drag_moved(&mut self, cells: &[RendererCell]) -> Option<TargetChanged> {
        let session = self.drag.as_mut()?;
        session.tracker.update(cells, &session.dragged_id)
    }

    /// Release the drag. Always clears the session; returns the combine to
    /// perform if a target was highlighted.
    pub fn end_drag(&mut self) -> Option<DropOnItem> {
        let session = self.drag.take()?;
        let target_id = session.tracker.current()?.to_owned();
        if target_id == session.dragged_id {
            return None;
        }
        Some(DropOnItem {
            grid: session.grid,
            dragged_id: session.dragged_id,
            target_id,
        })
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    /// Route one right-click. `hits` are the grids under the pointer; only
    /// the innermost one receives the click. Returns the grid to toggle when
    /// the gesture fires.
    pub fn right_click(&mut self, hits: &[GridPath], now: Instant) -> Option<GridPath> {
        let innermost = hits.iter().max_by_key(|path| path.depth())?;
        if self.right_click.register(innermost, now) {
            log::debug!("double right-click on {innermost}");
            Some(innermost.clone())
        } else {
            None
        }
    }
}
