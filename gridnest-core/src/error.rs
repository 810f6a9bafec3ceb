use thiserror::Error;

/// Structural errors in a layout tree or in the props it was read from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Duplicate item id: {0}")]
    DuplicateId(String),

    #[error("Item '{id}' is invalid: {reason}")]
    InvalidItem { id: String, reason: &'static str },

    #[error("Item '{id}' has a zero-sized span ({w}x{h})")]
    InvalidSpan { id: String, w: u32, h: u32 },

    #[error("Malformed layout prop '{prop}': {reason}")]
    MalformedProps { prop: String, reason: String },
}
