//! # gridnest-core - nested grid layout model
//!
//! The data layer shared by the layout engines, the config store and the
//! sync client:
//!
//! - [`item`] - [`LayoutItem`] nodes (leaf or group), [`Direction`] and the
//!   placement rules every engine shares
//! - [`tree`] - depth-one lookups and copy-on-write list edits
//! - [`document`] - the root [`LayoutDocument`], grid addressing by
//!   [`GridPath`], and the persisted [`ConfigDocument`]
//! - [`ids`] - [`IdMint`] for collision-free re-keying
//!
//! No I/O happens here.

pub mod document;
pub mod error;
pub mod ids;
pub mod item;
pub mod tree;

pub use document::{
    ComponentConfig, ConfigDocument, DocumentField, GridPath, GridRef, LayoutDocument,
    DEFAULT_ROOT_COLUMNS, DEFAULT_ROOT_PADDING, DEFAULT_ROW_HEIGHT, MAX_COLUMNS, MIN_COLUMNS,
};
pub use error::LayoutError;
pub use ids::IdMint;
pub use item::{
    clamp_padding, Direction, Group, ItemContent, LayoutItem, DEFAULT_GROUP_COLUMNS,
    DEFAULT_GROUP_PADDING, MAX_PADDING, MIN_PADDING,
};
