//! Root layout surface and the persisted config document that carries it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LayoutError;
use crate::item::{Direction, LayoutItem, MAX_PADDING};
use crate::tree::{check_unique_ids, collect_ids, find_item};

pub const DEFAULT_ROOT_COLUMNS: u32 = 4;
pub const DEFAULT_ROW_HEIGHT: u32 = 100;
pub const DEFAULT_ROOT_PADDING: u32 = 16;
/// Column bound applied wherever a column count enters the system.
pub const MIN_COLUMNS: u32 = 1;
pub const MAX_COLUMNS: u32 = 20;

/// Root-level fields of a grid surface, by persisted prop name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentField {
    Layout,
    Columns,
    RowHeight,
    Padding,
    Direction,
}

impl DocumentField {
    pub const ALL: [DocumentField; 5] = [
        DocumentField::Layout,
        DocumentField::Columns,
        DocumentField::RowHeight,
        DocumentField::Padding,
        DocumentField::Direction,
    ];

    pub fn prop_name(self) -> &'static str {
        match self {
            DocumentField::Layout => "layout",
            DocumentField::Columns => "cols",
            DocumentField::RowHeight => "rowHeight",
            DocumentField::Padding => "padding",
            DocumentField::Direction => "compactType",
        }
    }
}

/// Address of a grid inside a surface: the chain of group ids from the root.
/// The empty path is the root grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridPath(Vec<String>);

impl GridPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn child(&self, group_id: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(group_id.into());
        Self(segments)
    }

    /// Parent grid and the id of this grid's group node in it.
    pub fn split_last(&self) -> Option<(GridPath, &str)> {
        let (last, parent) = self.0.split_last()?;
        Some((GridPath(parent.to_vec()), last.as_str()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for GridPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("/"))
        }
    }
}

/// Borrowed view of one grid: its items and the settings that place them.
#[derive(Clone, Copy, Debug)]
pub struct GridRef<'a> {
    pub items: &'a [LayoutItem],
    pub columns: u32,
    pub direction: Direction,
}

/// One named layout surface.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutDocument {
    pub items: Vec<LayoutItem>,
    pub columns: u32,
    pub row_height: u32,
    pub padding: u32,
    pub direction: Direction,
}

impl Default for LayoutDocument {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            columns: DEFAULT_ROOT_COLUMNS,
            row_height: DEFAULT_ROW_HEIGHT,
            padding: DEFAULT_ROOT_PADDING,
            direction: Direction::Stacked,
        }
    }
}

fn malformed(field: DocumentField, reason: String) -> LayoutError {
    log::debug!("rejecting surface props: {} ({reason})", field.prop_name());
    LayoutError::MalformedProps {
        prop: field.prop_name().to_string(),
        reason,
    }
}

fn read_u32(props: &Map<String, Value>, field: DocumentField) -> Result<Option<u32>, LayoutError> {
    match props.get(field.prop_name()) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n.min(u64::from(u32::MAX)) as u32))
            .ok_or_else(|| {
                malformed(field, format!("expected a non-negative integer, got {value}"))
            }),
    }
}

impl LayoutDocument {
    pub fn new(items: Vec<LayoutItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Read a surface from its component props, filling defaults for
    /// anything absent.
    pub fn from_props(props: &Map<String, Value>) -> Result<Self, LayoutError> {
        let mut doc = Self::default();

        if let Some(layout) = props.get(DocumentField::Layout.prop_name()) {
            if !layout.is_null() {
                doc.items = serde_json::from_value(layout.clone())
                    .map_err(|e| malformed(DocumentField::Layout, e.to_string()))?;
            }
        }
        // Zero falls back to the default, like an unset value.
        if let Some(columns) = read_u32(props, DocumentField::Columns)?.filter(|c| *c > 0) {
            doc.columns = columns.clamp(MIN_COLUMNS, MAX_COLUMNS);
        }
        if let Some(row_height) = read_u32(props, DocumentField::RowHeight)?.filter(|r| *r > 0) {
            doc.row_height = row_height;
        }
        if let Some(padding) = read_u32(props, DocumentField::Padding)? {
            doc.padding = padding.min(MAX_PADDING);
        }
        if let Some(direction) = props.get(DocumentField::Direction.prop_name()) {
            if !direction.is_null() {
                doc.direction = serde_json::from_value(direction.clone())
                    .map_err(|e| malformed(DocumentField::Direction, e.to_string()))?;
            }
        }

        check_unique_ids(&doc.items)?;
        Ok(doc)
    }

    /// Persisted value of one root-level field.
    pub fn field_value(&self, field: DocumentField) -> Value {
        match field {
            DocumentField::Layout => {
                serde_json::to_value(&self.items).unwrap_or_else(|_| Value::Array(Vec::new()))
            }
            DocumentField::Columns => Value::from(self.columns),
            DocumentField::RowHeight => Value::from(self.row_height),
            DocumentField::Padding => Value::from(self.padding),
            DocumentField::Direction => {
                serde_json::to_value(self.direction).unwrap_or(Value::Null)
            }
        }
    }

    /// Batch-patch body carrying the current values of `fields`.
    pub fn updates(&self, fields: &[DocumentField]) -> Map<String, Value> {
        fields
            .iter()
            .map(|field| (field.prop_name().to_string(), self.field_value(*field)))
            .collect()
    }

    pub fn to_props(&self) -> Map<String, Value> {
        self.updates(&DocumentField::ALL)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        check_unique_ids(&self.items)
    }

    pub fn all_ids(&self) -> rustc_hash::FxHashSet<String> {
        collect_ids(&self.items)
    }

    /// Resolve `path` to a grid view. `None` if any segment is missing or
    /// names a leaf.
    pub fn grid(&self, path: &GridPath) -> Option<GridRef<'_>> {
        let mut grid = GridRef {
            items: &self.items,
            columns: self.columns,
            direction: self.direction,
        };
        for segment in path.segments() {
            let group = find_item(grid.items, segment)?.as_group()?;
            grid = GridRef {
                items: &group.items,
                columns: group.columns,
                direction: group.direction,
            };
        }
        Some(grid)
    }

    pub fn items_mut(&mut self, path: &GridPath) -> Option<&mut Vec<LayoutItem>> {
        let mut items = &mut self.items;
        for segment in path.segments() {
            items = items
                .iter_mut()
                .find(|item| item.id == *segment)?
                .as_group_mut()
                .map(|group| &mut group.items)?;
        }
        Some(items)
    }

    /// Swap in a new item list for the grid at `path`.
    pub fn set_grid_items(&mut self, path: &GridPath, items: Vec<LayoutItem>) -> bool {
        match self.items_mut(path) {
            Some(slot) => {
                *slot = items;
                true
            }
            None => false,
        }
    }
}

/// One component entry of the persisted document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentConfig {
    pub fn new(component_type: impl Into<String>, props: Map<String, Value>) -> Self {
        Self {
            component_type: component_type.into(),
            file: None,
            props,
            extra: Map::new(),
        }
    }
}

/// The whole persisted document: every surface of the project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub components: IndexMap<String, ComponentConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            components: IndexMap::new(),
            extra: Map::new(),
        }
    }

    pub fn with_component(mut self, surface_id: impl Into<String>, component: ComponentConfig) -> Self {
        self.components.insert(surface_id.into(), component);
        self
    }

    pub fn component(&self, surface_id: &str) -> Option<&ComponentConfig> {
        self.components.get(surface_id)
    }

    pub fn component_mut(&mut self, surface_id: &str) -> Option<&mut ComponentConfig> {
        self.components.get_mut(surface_id)
    }

    /// Layout surface stored under `surface_id`, if that component exists.
    pub fn layout(&self, surface_id: &str) -> Option<Result<LayoutDocument, LayoutError>> {
        self.component(surface_id)
            .map(|component| LayoutDocument::from_props(&component.props))
    }

    /// Two-space indented JSON, the on-disk form.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
