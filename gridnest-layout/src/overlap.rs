//! Combine-target detection during a drag.
//!
//! The renderer reports live cell rectangles while an item is being dragged.
//! Each report is scored against every sibling by the share of the dragged
//! item's area that lies over it; the best sibling at or above
//! [`COMBINE_THRESHOLD`] becomes the combine target.
//!
//! # Design decisions
//!
//! * **Half-open rectangles.** `[x, x+w) × [y, y+h)`, so items that only
//!   touch along an edge do not overlap.
//! * **Strict `>` when ranking.** Equal scores keep the earlier candidate,
//!   which makes list order the tie breaker.
//! * **Change-only events.** [`OverlapTracker`] reports a target only when
//!   it differs from the previous report.

use gridnest_core::LayoutItem;
use serde::{Deserialize, Serialize};

/// Minimum overlap percentage for a sibling to become a combine target.
pub const COMBINE_THRESHOLD: f64 = 50.0;

// ───────────────────────────────────────────────────────────────────
// CellRect
// ───────────────────────────────────────────────────────────────────

/// Rectangle in grid-cell units. Fractional while the renderer is mid-drag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl CellRect {
    #[inline(always)]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    #[inline(always)]
    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Area shared with `other`, zero when the rectangles are disjoint or
    /// only touch.
    #[inline]
    pub fn intersection_area(&self, other: &CellRect) -> f64 {
        let left = self.x.max(other.x);
        let right = (self.x + self.w).min(other.x + other.w);
        let top = self.y.max(other.y);
        let bottom = (self.y + self.h).min(other.y + other.h);
        if left < right && top < bottom {
            (right - left) * (bottom - top)
        } else {
            0.0
        }
    }
}

impl From<&LayoutItem> for CellRect {
    fn from(item: &LayoutItem) -> Self {
        Self::new(
            f64::from(item.x),
            f64::from(item.y),
            f64::from(item.w),
            f64::from(item.h),
        )
    }
}

/// One cell as reported by the renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RendererCell {
    #[serde(rename = "i")]
    pub id: String,
    #[serde(flatten)]
    pub rect: CellRect,
}

impl RendererCell {
    pub fn new(id: impl Into<String>, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            id: id.into(),
            rect: CellRect::new(x, y, w, h),
        }
    }
}

impl From<&LayoutItem> for RendererCell {
    fn from(item: &LayoutItem) -> Self {
        Self {
            id: item.id.clone(),
            rect: CellRect::from(item),
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Scoring
// ───────────────────────────────────────────────────────────────────

/// Percentage of `dragged`'s area covered by `target`, in `[0, 100]`.
#[inline]
pub fn compute_overlap(dragged: &CellRect, target: &CellRect) -> f64 {
    let area = dragged.area();
    if area <= 0.0 {
        return 0.0;
    }
    (dragged.intersection_area(target) / area * 100.0).clamp(0.0, 100.0)
}

/// Sibling of `dragged_id` with the highest overlap at or above the
/// threshold. `None` if the dragged id is not in `cells` or nothing
/// qualifies.
pub fn select_target<'a>(cells: &'a [RendererCell], dragged_id: &str) -> Option<&'a str> {
    let dragged = cells.iter().find(|cell| cell.id == dragged_id)?;

    let mut best: Option<(&str, f64)> = None;
    for cell in cells {
        if cell.id == dragged_id {
            continue;
        }
        let overlap = compute_overlap(&dragged.rect, &cell.rect);
        if overlap < COMBINE_THRESHOLD {
            continue;
        }
        match best {
            Some((_, top)) if overlap <= top => {}
            _ => best = Some((cell.id.as_str(), overlap)),
        }
    }
    best.map(|(id, _)| id)
}

// ───────────────────────────────────────────────────────────────────
// OverlapTracker
// ───────────────────────────────────────────────────────────────────

/// Emitted when the selected combine target changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetChanged {
    /// New target, `None` when the drag left every candidate.
    pub target: Option<String>,
}

/// Remembers the last selected target of one drag.
#[derive(Clone, Debug, Default)]
pub struct OverlapTracker {
    last: Option<String>,
}

impl OverlapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score a live report. Returns an event only if the target changed
    /// since the previous call.
    pub fn update(&mut self, cells: &[RendererCell], dragged_id: &str) -> Option<TargetChanged> {
        let selected = select_target(cells, dragged_id);
        if selected == self.last.as_deref() {
            return None;
        }
        self.last = selected.map(str::to_owned);
        log::debug!("combine target for {dragged_id} -> {:?}", self.last);
        Some(TargetChanged {
            target: self.last.clone(),
        })
    }

    pub fn current(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
