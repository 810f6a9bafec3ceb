//! User operations addressed at any grid of a [`LayoutDocument`].
//!
//! [`LayoutOp::apply`] resolves the grid, runs the matching engine function
//! and writes the result back. It reports which root-level fields changed so
//! the caller can send exactly those to the store. Nested edits always
//! surface as a change of the root `layout` field, since the nested grids
//! live inside it.

use gridnest_core::{clamp_padding, Direction, DocumentField, GridPath, IdMint, LayoutDocument};

use crate::engine;
use crate::overlap::RendererCell;

/// Padding step of the padding controls.
pub const PADDING_STEP: i32 = 2;

#[derive(Clone, Debug, PartialEq)]
pub enum LayoutOp {
    /// Drop `dragged` onto `target`, both direct children of `grid`.
    Combine {
        grid: GridPath,
        dragged: String,
        target: String,
    },
    /// Dissolve group `group`, a direct child of `grid`.
    Uncombine { grid: GridPath, group: String },
    /// Flip the direction of the grid at `grid` and re-place its children.
    ToggleDirection { grid: GridPath },
    /// Set the root direction without moving anything.
    SetRootDirection(Direction),
    /// Shift the padding of the grid at `grid` (root or group).
    AdjustPadding { grid: GridPath, delta: i32 },
    /// Cells reported by the renderer for the grid at `grid`.
    RendererLayout {
        grid: GridPath,
        cells: Vec<RendererCell>,
    },
}

impl LayoutOp {
    /// Apply to `doc`. `None` when nothing changed.
    pub fn apply(&self, doc: &mut LayoutDocument) -> Option<Vec<DocumentField>> {
        let mut mint = IdMint::for_tree(&doc.items);
        self.apply_with(doc, &mut mint)
    }

    /// [`LayoutOp::apply`] with a caller-supplied id mint.
    pub fn apply_with(&self, doc: &mut LayoutDocument, mint: &mut IdMint) -> Option<Vec<DocumentField>> {
        match self {
            LayoutOp::Combine {
                grid,
                dragged,
                target,
            } => {
                let items = engine::combine(doc.grid(grid)?.items, dragged, target, mint)?;
                commit(doc, grid, items)
            }
            LayoutOp::Uncombine { grid, group } => {
                let view = doc.grid(grid)?;
                let items = engine::uncombine(view.items, group, view.columns, mint)?;
                commit(doc, grid, items)
            }
            LayoutOp::ToggleDirection { grid } => match grid.split_last() {
                None => {
                    let direction = doc.direction.toggled();
                    doc.items = engine::reflow(&doc.items, direction, doc.columns);
                    doc.direction = direction;
                    log::info!("root direction -> {direction:?}");
                    Some(vec![DocumentField::Layout, DocumentField::Direction])
                }
                Some((parent, group_id)) => {
                    let items = engine::toggle_group(doc.grid(&parent)?.items, group_id)?;
                    commit(doc, &parent, items)
                }
            },
            LayoutOp::SetRootDirection(direction) => {
                if doc.direction == *direction {
                    return None;
                }
                doc.direction = *direction;
                Some(vec![DocumentField::Direction])
            }
            LayoutOp::AdjustPadding { grid, delta } => match grid.split_last() {
                None => {
                    let padding = clamp_padding(doc.padding, *delta);
                    if padding == doc.padding {
                        return None;
                    }
                    doc.padding = padding;
                    Some(vec![DocumentField::Padding])
                }
                Some((parent, group_id)) => {
                    let items = engine::adjust_group_padding(doc.grid(&parent)?.items, group_id, *delta)?;
                    commit(doc, &parent, items)
                }
            },
            LayoutOp::RendererLayout { grid, cells } => {
                let items = engine::merge_renderer_layout(doc.grid(grid)?.items, cells)?;
                commit(doc, grid, items)
            }
        }
    }
}

fn commit(
    doc: &mut LayoutDocument,
    grid: &GridPath,
    items: Vec<gridnest_core::LayoutItem>,
) -> Option<Vec<DocumentField>> {
    if !doc.set_grid_items(grid, items) {
        log::debug!("grid {grid} vanished before commit");
        return None;
    }
    Some(vec![DocumentField::Layout])
}
