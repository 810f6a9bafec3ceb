//! Layout tree nodes.
//!
//! A [`LayoutItem`] is either a leaf that renders one external component or
//! a group that owns a nested grid. The two cases are an enum, so a node can
//! never be both. On the wire both shapes share one JSON object
//! (`childIndex` vs `nested`), which is checked on the way in.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Column count of a freshly created group.
pub const DEFAULT_GROUP_COLUMNS: u32 = 2;
/// Padding (px) of a freshly created group.
pub const DEFAULT_GROUP_PADDING: u32 = 8;
/// Padding bounds shared by the root grid and every group.
pub const MIN_PADDING: u32 = 0;
pub const MAX_PADDING: u32 = 32;

/// Stacking direction of a grid.
///
/// Serialized with the renderer's compaction names: stacked grids compact
/// `"vertical"`, flowed grids compact `"horizontal"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// One child per row, single column.
    #[default]
    #[serde(rename = "vertical", alias = "stacked")]
    Stacked,
    /// Left to right, wrapping at the column count.
    #[serde(rename = "horizontal", alias = "flowed")]
    Flowed,
}

impl Direction {
    pub fn toggled(self) -> Self {
        match self {
            Direction::Stacked => Direction::Flowed,
            Direction::Flowed => Direction::Stacked,
        }
    }

    /// Cell of the `index`-th child in a grid with `columns` columns.
    #[inline]
    pub fn place(self, index: usize, columns: u32) -> (u32, u32) {
        let columns = columns.max(1) as usize;
        match self {
            Direction::Flowed => ((index % columns) as u32, (index / columns) as u32),
            Direction::Stacked => (0, index as u32),
        }
    }

    /// Rows occupied by `count` children placed with [`Direction::place`].
    #[inline]
    pub fn rows_needed(self, count: usize, columns: u32) -> u32 {
        let columns = columns.max(1) as usize;
        match self {
            Direction::Flowed => count.div_ceil(columns) as u32,
            Direction::Stacked => count as u32,
        }
    }

    /// Group height that fits `count` children plus one row of slack.
    #[inline]
    pub fn fitted_height(self, count: usize, columns: u32) -> u32 {
        self.rows_needed(count, columns) + 1
    }
}

/// Clamp a padding value into `[MIN_PADDING, MAX_PADDING]` after applying a
/// signed delta.
pub fn clamp_padding(current: u32, delta: i32) -> u32 {
    let next = i64::from(current) + i64::from(delta);
    next.clamp(i64::from(MIN_PADDING), i64::from(MAX_PADDING)) as u32
}

fn default_group_columns() -> u32 {
    DEFAULT_GROUP_COLUMNS
}

fn default_group_padding() -> u32 {
    DEFAULT_GROUP_PADDING
}

/// A nested grid owned by a group node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub items: Vec<LayoutItem>,
    #[serde(rename = "cols", default = "default_group_columns")]
    pub columns: u32,
    #[serde(rename = "compactType", default)]
    pub direction: Direction,
    #[serde(default = "default_group_padding")]
    pub padding: u32,
}

impl Group {
    /// Flowed two-column group with default padding.
    pub fn new(items: Vec<LayoutItem>) -> Self {
        Self {
            items,
            columns: DEFAULT_GROUP_COLUMNS,
            direction: Direction::Flowed,
            padding: DEFAULT_GROUP_PADDING,
        }
    }
}

/// Payload of a layout node.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemContent {
    /// Renders the external component at this index.
    Leaf { child_ref: usize },
    /// Owns a nested grid.
    Group(Group),
}

/// A node in the layout tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawItem", into = "RawItem")]
pub struct LayoutItem {
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub content: ItemContent,
}

impl LayoutItem {
    pub fn leaf(id: impl Into<String>, child_ref: usize, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            w,
            h,
            content: ItemContent::Leaf { child_ref },
        }
    }

    pub fn group(id: impl Into<String>, group: Group, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            w,
            h,
            content: ItemContent::Group(group),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.content, ItemContent::Group(_))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.content {
            ItemContent::Group(group) => Some(group),
            ItemContent::Leaf { .. } => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.content {
            ItemContent::Group(group) => Some(group),
            ItemContent::Leaf { .. } => None,
        }
    }

    pub fn child_ref(&self) -> Option<usize> {
        match self.content {
            ItemContent::Leaf { child_ref } => Some(child_ref),
            ItemContent::Group(_) => None,
        }
    }

    /// Copy of this item with a new id and cell, payload untouched.
    pub fn moved(&self, id: impl Into<String>, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            w,
            h,
            content: self.content.clone(),
        }
    }
}

/// Wire shape shared by leaves and groups.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    i: String,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    child_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nested: Option<Group>,
}

impl TryFrom<RawItem> for LayoutItem {
    type Error = LayoutError;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        if raw.w == 0 || raw.h == 0 {
            return Err(LayoutError::InvalidSpan {
                id: raw.i,
                w: raw.w,
                h: raw.h,
            });
        }
        let content = match (raw.child_index, raw.nested) {
            (Some(child_ref), None) => ItemContent::Leaf { child_ref },
            (None, Some(group)) => ItemContent::Group(group),
            (Some(_), Some(_)) => {
                return Err(LayoutError::InvalidItem {
                    id: raw.i,
                    reason: "has both childIndex and nested",
                })
            }
            (None, None) => {
                return Err(LayoutError::InvalidItem {
                    id: raw.i,
                    reason: "has neither childIndex nor nested",
                })
            }
        };
        Ok(Self {
            id: raw.i,
            x: raw.x,
            y: raw.y,
            w: raw.w,
            h: raw.h,
            content,
        })
    }
}

impl From<LayoutItem> for RawItem {
    fn from(item: LayoutItem) -> Self {
        let (child_index, nested) = match item.content {
            ItemContent::Leaf { child_ref } => (Some(child_ref), None),
            ItemContent::Group(group) => (None, Some(group)),
        };
        Self {
            i: item.id,
            x: item.x,
            y: item.y,
            w: item.w,
            h: item.h,
            child_index,
            nested,
        }
    }
}
