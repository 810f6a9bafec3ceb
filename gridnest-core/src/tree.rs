//! Queries and copy-on-write edits over one item list.
//!
//! Lookups are depth-one: callers address the direct children of a single
//! grid. Edits never touch the input slice; they return a new list.

use rustc_hash::FxHashSet;

use crate::error::LayoutError;
use crate::item::{ItemContent, LayoutItem};

/// Direct child of `items` with the given id.
pub fn find_item<'a>(items: &'a [LayoutItem], id: &str) -> Option<&'a LayoutItem> {
    items.iter().find(|item| item.id == id)
}

pub fn position_of(items: &[LayoutItem], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id == id)
}

/// `items` with `item` appended.
pub fn insert(items: &[LayoutItem], item: LayoutItem) -> Vec<LayoutItem> {
    let mut next = Vec::with_capacity(items.len() + 1);
    next.extend_from_slice(items);
    next.push(item);
    next
}

/// `items` without the child `id`. Unknown ids yield an unchanged copy.
pub fn remove(items: &[LayoutItem], id: &str) -> Vec<LayoutItem> {
    items.iter().filter(|item| item.id != id).cloned().collect()
}

/// `items` with the child sharing `replacement.id` swapped out in place.
pub fn replace(items: &[LayoutItem], replacement: LayoutItem) -> Vec<LayoutItem> {
    items
        .iter()
        .map(|item| {
            if item.id == replacement.id {
                replacement.clone()
            } else {
                item.clone()
            }
        })
        .collect()
}

/// Every id in the subtree rooted at `items`, nested groups included.
pub fn collect_ids(items: &[LayoutItem]) -> FxHashSet<String> {
    let mut ids = FxHashSet::default();
    let mut stack: Vec<&[LayoutItem]> = vec![items];
    while let Some(list) = stack.pop() {
        for item in list {
            ids.insert(item.id.clone());
            if let ItemContent::Group(group) = &item.content {
                stack.push(&group.items);
            }
        }
    }
    ids
}

/// Fails on the first id that appears twice anywhere in the tree.
pub fn check_unique_ids(items: &[LayoutItem]) -> Result<(), LayoutError> {
    let mut seen = FxHashSet::default();
    let mut stack: Vec<&[LayoutItem]> = vec![items];
    while let Some(list) = stack.pop() {
        for item in list {
            if !seen.insert(item.id.as_str()) {
                return Err(LayoutError::DuplicateId(item.id.clone()));
            }
            if let ItemContent::Group(group) = &item.content {
                stack.push(&group.items);
            }
        }
    }
    Ok(())
}

/// True when no two direct children share an origin cell.
pub fn has_unique_origins(items: &[LayoutItem]) -> bool {
    let mut origins = FxHashSet::default();
    items.iter().all(|item| origins.insert((item.x, item.y)))
}

/// True when every list in the tree has unique origins.
pub fn has_unique_origins_deep(items: &[LayoutItem]) -> bool {
    has_unique_origins(items)
        && items
            .iter()
            .filter_map(LayoutItem::as_group)
            .all(|group| has_unique_origins_deep(&group.items))
}
