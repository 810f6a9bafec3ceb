//! Structural edits on one grid's item list.
//!
//! Every function takes the current list by reference and returns the
//! replacement list, or `None` when the edit does not apply (an id that is
//! no longer present, a leaf where a group was expected). `None` means
//! "nothing happened"; callers keep their current state.
//!
//! Ids minted here come from an [`IdMint`] seeded with the whole tree, so
//! re-keyed items stay unique across nesting levels.

use gridnest_core::tree::{find_item, insert, remove, replace};
use gridnest_core::{clamp_padding, Direction, Group, IdMint, LayoutItem};
use rustc_hash::FxHashSet;

use crate::overlap::RendererCell;

/// Minimum span of a group created from two items.
pub const NEW_GROUP_MIN_WIDTH: u32 = 2;
pub const NEW_GROUP_MIN_HEIGHT: u32 = 3;
/// Floor for the height of a group extracted from its parent.
pub const EXTRACTED_GROUP_MIN_HEIGHT: u32 = 2;

/// First slot at or after `start` whose origin is not in `occupied`.
fn next_free_slot(
    direction: Direction,
    columns: u32,
    start: usize,
    occupied: &FxHashSet<(u32, u32)>,
) -> (usize, (u32, u32)) {
    let mut index = start;
    loop {
        let cell = direction.place(index, columns);
        if !occupied.contains(&cell) {
            return (index, cell);
        }
        index += 1;
    }
}

/// First row at or below `start` in column `x` whose origin is free. Falls
/// back to scanning upward once the coordinate space runs out.
fn free_row(x: u32, start: u32, occupied: &FxHashSet<(u32, u32)>) -> u32 {
    (start..=u32::MAX)
        .chain((0..start).rev())
        .find(|y| !occupied.contains(&(x, *y)))
        .unwrap_or(start)
}

fn origins(items: &[LayoutItem]) -> FxHashSet<(u32, u32)> {
    items.iter().map(|item| (item.x, item.y)).collect()
}

// ───────────────────────────────────────────────────────────────────
// Combine
// ───────────────────────────────────────────────────────────────────

/// Drop `dragged_id` onto `target_id`.
///
/// A group target absorbs the dragged item as its next child. A leaf target
/// is merged with the dragged item into a new flowed two-column group placed
/// where the target was.
pub fn combine(
    items: &[LayoutItem],
    dragged_id: &str,
    target_id: &str,
    mint: &mut IdMint,
) -> Option<Vec<LayoutItem>> {
    if dragged_id == target_id {
        log::debug!("combine skipped: {dragged_id} dropped on itself");
        return None;
    }
    let (Some(dragged), Some(target)) = (find_item(items, dragged_id), find_item(items, target_id))
    else {
        log::debug!("combine skipped: {dragged_id} or {target_id} not in grid");
        return None;
    };

    let next = match target.as_group() {
        Some(group) => absorb_into_group(items, dragged, target, group, mint),
        None => merge_into_new_group(items, dragged, target, mint),
    };
    Some(next)
}

fn absorb_into_group(
    items: &[LayoutItem],
    dragged: &LayoutItem,
    target: &LayoutItem,
    group: &Group,
    mint: &mut IdMint,
) -> Vec<LayoutItem> {
    let count = group.items.len();
    let (index, (x, y)) = next_free_slot(group.direction, group.columns, count, &origins(&group.items));
    let child = dragged.moved(mint.appended_child(&dragged.id), x, y, 1, 1);

    let mut absorbed = group.clone();
    absorbed.items = insert(&group.items, child);
    let fitted = group
        .direction
        .fitted_height(absorbed.items.len().max(index + 1), group.columns);
    let grown = LayoutItem::group(
        target.id.clone(),
        absorbed,
        target.x,
        target.y,
        target.w,
        target.h.max(fitted),
    );

    log::info!("absorbed {} into group {}", dragged.id, target.id);
    replace(&remove(items, &dragged.id), grown)
}

fn merge_into_new_group(
    items: &[LayoutItem],
    dragged: &LayoutItem,
    target: &LayoutItem,
    mint: &mut IdMint,
) -> Vec<LayoutItem> {
    let first = target.moved(mint.nested_child(&target.id), 0, 0, 1, 1);
    let second = dragged.moved(mint.nested_child(&dragged.id), 1, 0, 1, 1);
    let group_id = mint.group();

    let created = LayoutItem::group(
        group_id,
        Group::new(vec![first, second]),
        target.x,
        target.y,
        dragged.w.max(target.w).max(NEW_GROUP_MIN_WIDTH),
        dragged.h.max(target.h).max(NEW_GROUP_MIN_HEIGHT),
    );

    log::info!(
        "combined {} and {} into {} at ({}, {})",
        target.id,
        dragged.id,
        created.id,
        created.x,
        created.y
    );
    let mut next: Vec<LayoutItem> = items
        .iter()
        .filter(|item| item.id != dragged.id && item.id != target.id)
        .cloned()
        .collect();
    next.push(created);
    next
}

// ───────────────────────────────────────────────────────────────────
// Uncombine
// ───────────────────────────────────────────────────────────────────

/// Dissolve the group `group_id` and append its children to `items`.
///
/// Child `k` lands at `(group.x + k % columns, group.y + k / columns)` using
/// the containing grid's `columns`. A child whose cell is already taken by
/// a sibling moves down until its origin is free. Coordinates saturate at
/// `u32::MAX` rather than wrapping.
pub fn uncombine(
    items: &[LayoutItem],
    group_id: &str,
    columns: u32,
    mint: &mut IdMint,
) -> Option<Vec<LayoutItem>> {
    let Some(node) = find_item(items, group_id) else {
        log::debug!("uncombine skipped: {group_id} not in grid");
        return None;
    };
    let Some(group) = node.as_group() else {
        log::debug!("uncombine skipped: {group_id} is a leaf");
        return None;
    };

    let columns = columns.max(1);
    let mut next = remove(items, group_id);
    let mut occupied = origins(&next);

    for (k, child) in group.items.iter().enumerate() {
        let k_cell = u32::try_from(k).unwrap_or(u32::MAX);
        let x = node.x.saturating_add(k_cell % columns);
        let y = free_row(x, node.y.saturating_add(k_cell / columns), &occupied);
        occupied.insert((x, y));

        let h = match child.as_group() {
            Some(inner) => Direction::Flowed
                .rows_needed(inner.items.len(), inner.columns)
                .saturating_add(1)
                .max(EXTRACTED_GROUP_MIN_HEIGHT),
            None => 1,
        };
        next.push(child.moved(mint.extracted(k), x, y, 1, h));
    }

    log::info!("uncombined {group_id} ({} children)", group.items.len());
    Some(next)
}

// ───────────────────────────────────────────────────────────────────
// Direction
// ───────────────────────────────────────────────────────────────────

/// Every item of a list re-placed by index for `direction`.
pub fn reflow(items: &[LayoutItem], direction: Direction, columns: u32) -> Vec<LayoutItem> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let (x, y) = direction.place(index, columns);
            LayoutItem { x, y, ..item.clone() }
        })
        .collect()
}

/// Flip the direction of group `group_id`, re-place its children and grow
/// it to fit them.
pub fn toggle_group(items: &[LayoutItem], group_id: &str) -> Option<Vec<LayoutItem>> {
    let node = find_item(items, group_id)?;
    let Some(group) = node.as_group() else {
        log::debug!("toggle skipped: {group_id} is a leaf");
        return None;
    };

    let direction = group.direction.toggled();
    let toggled = Group {
        items: reflow(&group.items, direction, group.columns),
        direction,
        ..group.clone()
    };
    let h = node
        .h
        .max(direction.fitted_height(toggled.items.len(), toggled.columns));

    log::info!("group {group_id} direction -> {direction:?}");
    let updated = LayoutItem::group(node.id.clone(), toggled, node.x, node.y, node.w, h);
    Some(replace(items, updated))
}

// ───────────────────────────────────────────────────────────────────
// Padding
// ───────────────────────────────────────────────────────────────────

/// Shift the padding of group `group_id` by `delta`, clamped. `None` when
/// the clamp leaves the value unchanged.
pub fn adjust_group_padding(items: &[LayoutItem], group_id: &str, delta: i32) -> Option<Vec<LayoutItem>> {
    let node = find_item(items, group_id)?;
    let group = node.as_group()?;
    let padding = clamp_padding(group.padding, delta);
    if padding == group.padding {
        return None;
    }
    let updated = LayoutItem::group(
        node.id.clone(),
        Group {
            padding,
            ..group.clone()
        },
        node.x,
        node.y,
        node.w,
        node.h,
    );
    Some(replace(items, updated))
}

// ───────────────────────────────────────────────────────────────────
// Renderer report
// ───────────────────────────────────────────────────────────────────

#[inline]
fn round_cell(value: f64, min: u32) -> u32 {
    if !value.is_finite() {
        return min;
    }
    (value.round().max(f64::from(min)).min(f64::from(u32::MAX))) as u32
}

/// Fold a renderer layout report into `items`.
///
/// Reported cells are rounded and applied by id; payloads always come from
/// the stored item. Unknown ids are ignored and unreported items keep their
/// cell. `None` when nothing moved.
pub fn merge_renderer_layout(items: &[LayoutItem], cells: &[RendererCell]) -> Option<Vec<LayoutItem>> {
    let mut changed = false;
    let next: Vec<LayoutItem> = items
        .iter()
        .map(|item| {
            let Some(cell) = cells.iter().find(|cell| cell.id == item.id) else {
                return item.clone();
            };
            let x = round_cell(cell.rect.x, 0);
            let y = round_cell(cell.rect.y, 0);
            let w = round_cell(cell.rect.w, 1);
            let h = round_cell(cell.rect.h, 1);
            if (x, y, w, h) != (item.x, item.y, item.w, item.h) {
                changed = true;
            }
            item.moved(item.id.clone(), x, y, w, h)
        })
        .collect();
    changed.then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridnest_core::tree::{check_unique_ids, collect_ids, has_unique_origins_deep};
    use gridnest_core::ItemContent;

    fn mint_for(items: &[LayoutItem]) -> IdMint {
        IdMint::with_stamp(collect_ids(items), 1000)
    }

    fn leaf(id: &str, child_ref: usize, x: u32, y: u32) -> LayoutItem {
        LayoutItem::leaf(id, child_ref, x, y, 1, 1)
    }

    fn assert_well_formed(items: &[LayoutItem]) {
        assert!(check_unique_ids(items).is_ok());
        assert!(has_unique_origins_deep(items));
    }

    #[test]
    fn test_drag_leaf_onto_leaf_creates_group_at_target() {
        let items = vec![leaf("A", 0, 0, 0), leaf("B", 1, 1, 0)];
        let mut mint = mint_for(&items);
        let next = combine(&items, "A", "B", &mut mint).unwrap();

        assert_eq!(next.len(), 1);
        let node = &next[0];
        assert_eq!((node.x, node.y), (1, 0));
        assert_eq!((node.w, node.h), (2, 3));
        let group = node.as_group().unwrap();
        assert_eq!(group.columns, 2);
        assert_eq!(group.direction, Direction::Flowed);
        assert_eq!(group.padding, 8);
        assert_eq!(group.items[0].id, "B-n");
        assert_eq!((group.items[0].x, group.items[0].y), (0, 0));
        assert_eq!(group.items[0].child_ref(), Some(1));
        assert_eq!(group.items[1].id, "A-n");
        assert_eq!((group.items[1].x, group.items[1].y), (1, 0));
        assert_eq!(group.items[1].child_ref(), Some(0));
        assert_well_formed(&next);
    }

    #[test]
    fn test_new_group_span_covers_larger_item() {
        let items = vec![
            LayoutItem::leaf("A", 0, 0, 0, 3, 1),
            LayoutItem::leaf("B", 1, 3, 0, 1, 4),
        ];
        let next = combine(&items, "A", "B", &mut mint_for(&items)).unwrap();
        assert_eq!((next[0].w, next[0].h), (3, 4));
    }

    #[test]
    fn test_combine_no_ops() {
        let items = vec![leaf("A", 0, 0, 0), leaf("B", 1, 1, 0)];
        let mut mint = mint_for(&items);
        assert!(combine(&items, "A", "A", &mut mint).is_none());
        assert!(combine(&items, "A", "gone", &mut mint).is_none());
        assert!(combine(&items, "gone", "B", &mut mint).is_none());
    }

    #[test]
    fn test_absorb_into_flowed_group() {
        let group = Group::new(vec![leaf("g1", 1, 0, 0), leaf("g2", 2, 1, 0)]);
        let items = vec![leaf("A", 0, 0, 0), LayoutItem::group("G", group, 1, 0, 2, 2)];
        let next = combine(&items, "A", "G", &mut mint_for(&items)).unwrap();

        assert_eq!(next.len(), 1);
        let node = &next[0];
        let group = node.as_group().unwrap();
        let added = group.items.last().unwrap();
        assert_eq!(added.id, "A-n-1000");
        assert_eq!((added.x, added.y, added.w, added.h), (0, 1, 1, 1));
        assert_eq!(added.child_ref(), Some(0));
        // ceil(3 / 2) + 1
        assert_eq!(node.h, 3);
        assert_well_formed(&next);
    }

    #[test]
    fn test_absorb_into_stacked_group_keeps_taller_height() {
        let mut group = Group::new(vec![leaf("g1", 1, 0, 0)]);
        group.direction = Direction::Stacked;
        let items = vec![leaf("A", 0, 3, 3), LayoutItem::group("G", group, 0, 0, 2, 6)];
        let next = combine(&items, "A", "G", &mut mint_for(&items)).unwrap();
        let node = &next[0];
        let added = node.as_group().unwrap().items.last().unwrap();
        assert_eq!((added.x, added.y), (0, 1));
        assert_eq!(node.h, 6);
    }

    #[test]
    fn test_absorb_skips_occupied_cell() {
        // The user moved g1 to (0,1), which is where index 1 would go.
        let mut group = Group::new(vec![leaf("g1", 1, 0, 1)]);
        group.direction = Direction::Stacked;
        let items = vec![leaf("A", 0, 3, 3), LayoutItem::group("G", group, 0, 0, 2, 2)];
        let next = combine(&items, "A", "G", &mut mint_for(&items)).unwrap();
        let node = &next[0];
        let added = node.as_group().unwrap().items.last().unwrap();
        assert_eq!((added.x, added.y), (0, 2));
        assert_eq!(node.h, 4);
        assert_well_formed(&next);
    }

    #[test]
    fn test_group_dragged_into_group_keeps_subtree() {
        let inner = Group::new(vec![leaf("i1", 1, 0, 0), leaf("i2", 2, 1, 0)]);
        let outer = Group::new(vec![leaf("o1", 3, 0, 0)]);
        let items = vec![
            LayoutItem::group("inner", inner.clone(), 0, 0, 2, 3),
            LayoutItem::group("outer", outer, 2, 0, 2, 3),
        ];
        let next = combine(&items, "inner", "outer", &mut mint_for(&items)).unwrap();
        let moved = next[0].as_group().unwrap().items.last().unwrap();
        assert_eq!(moved.content, ItemContent::Group(inner));
        assert_well_formed(&next);
    }

    #[test]
    fn test_uncombine_spreads_over_containing_columns() {
        let group = Group::new(vec![
            leaf("c0", 0, 0, 0),
            leaf("c1", 1, 1, 0),
            leaf("c2", 2, 0, 1),
        ]);
        let items = vec![LayoutItem::group("G", group, 1, 2, 2, 3)];
        let next = uncombine(&items, "G", 2, &mut mint_for(&items)).unwrap();

        let cells: Vec<_> = next.iter().map(|i| (i.x, i.y, i.w, i.h)).collect();
        assert_eq!(cells, vec![(1, 2, 1, 1), (2, 2, 1, 1), (1, 3, 1, 1)]);
        let ids: Vec<_> = next.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["item-1000-0", "item-1000-1", "item-1000-2"]);
        assert_well_formed(&next);
    }

    #[test]
    fn test_uncombine_sizes_nested_group_child() {
        let mut deep = Group::new((0..5).map(|i| leaf(&format!("d{i}"), i, 0, 0)).collect());
        deep.columns = 2;
        for (i, item) in deep.items.iter_mut().enumerate() {
            let (x, y) = Direction::Flowed.place(i, 2);
            item.x = x;
            item.y = y;
        }
        let group = Group::new(vec![LayoutItem::group("deep", deep, 0, 0, 2, 2)]);
        let items = vec![LayoutItem::group("G", group, 0, 0, 2, 3)];
        let next = uncombine(&items, "G", 4, &mut mint_for(&items)).unwrap();
        // max(2, ceil(5 / 2) + 1)
        assert_eq!(next[0].h, 4);
        assert_eq!(next[0].w, 1);
        assert_eq!(next[0].as_group().unwrap().items.len(), 5);
    }

    #[test]
    fn test_uncombine_avoids_sibling_origins() {
        let group = Group::new(vec![leaf("c0", 0, 0, 0), leaf("c1", 1, 1, 0)]);
        let items = vec![
            LayoutItem::group("G", group, 0, 0, 2, 3),
            leaf("S", 2, 1, 0),
        ];
        let next = uncombine(&items, "G", 4, &mut mint_for(&items)).unwrap();
        let placed: Vec<_> = next.iter().map(|i| (i.id.as_str(), i.x, i.y)).collect();
        assert_eq!(
            placed,
            vec![("S", 1, 0), ("item-1000-0", 0, 0), ("item-1000-1", 1, 1)]
        );
        assert_well_formed(&next);
    }

    #[test]
    fn test_uncombine_at_coordinate_limit() {
        let group = Group::new(vec![leaf("c0", 0, 0, 0), leaf("c1", 1, 1, 0)]);
        let items = vec![LayoutItem::group("G", group, u32::MAX, 0, 2, 3)];
        let next = uncombine(&items, "G", 4, &mut mint_for(&items)).unwrap();
        let placed: Vec<_> = next.iter().map(|i| (i.x, i.y)).collect();
        assert_eq!(placed, vec![(u32::MAX, 0), (u32::MAX, 1)]);
        assert_well_formed(&next);
    }

    #[test]
    fn test_uncombine_after_huge_renderer_report() {
        let group = Group::new(vec![leaf("c0", 0, 0, 0), leaf("c1", 1, 1, 0)]);
        let items = vec![LayoutItem::group("G", group, 0, 0, 2, 3)];
        let cells = vec![RendererCell::new("G", 1e12, 0.0, 2.0, 3.0)];
        let merged = merge_renderer_layout(&items, &cells).unwrap();
        assert_eq!(merged[0].x, u32::MAX);
        let next = uncombine(&merged, "G", 4, &mut mint_for(&merged)).unwrap();
        assert_eq!(next.len(), 2);
        assert!(next.iter().all(|item| item.x == u32::MAX));
        assert_well_formed(&next);
    }

    #[test]
    fn test_uncombine_bottom_edge_scans_upward() {
        let group = Group::new(vec![leaf("c0", 0, 0, 0), leaf("c1", 1, 0, 1)]);
        let items = vec![LayoutItem::group("G", group, 0, u32::MAX, 1, 3)];
        let next = uncombine(&items, "G", 1, &mut mint_for(&items)).unwrap();
        let placed: Vec<_> = next.iter().map(|i| (i.x, i.y)).collect();
        assert_eq!(placed, vec![(0, u32::MAX), (0, u32::MAX - 1)]);
        assert_well_formed(&next);
    }

    #[test]
    fn test_uncombine_no_ops() {
        let items = vec![leaf("A", 0, 0, 0)];
        let mut mint = mint_for(&items);
        assert!(uncombine(&items, "A", 4, &mut mint).is_none());
        assert!(uncombine(&items, "missing", 4, &mut mint).is_none());
    }

    #[test]
    fn test_uncombine_restores_combined_payloads() {
        let items = vec![leaf("X", 7, 0, 0), leaf("Y", 9, 1, 0)];
        let mut mint = mint_for(&items);
        let combined = combine(&items, "X", "Y", &mut mint).unwrap();
        let group_id = combined[0].id.clone();
        let restored = uncombine(&combined, &group_id, 4, &mut mint).unwrap();

        let mut payloads: Vec<_> = restored.iter().map(|i| i.content.clone()).collect();
        payloads.sort_by_key(|c| match c {
            ItemContent::Leaf { child_ref } => *child_ref,
            ItemContent::Group(_) => usize::MAX,
        });
        assert_eq!(
            payloads,
            vec![ItemContent::Leaf { child_ref: 7 }, ItemContent::Leaf { child_ref: 9 }]
        );
        assert!(restored.iter().all(|i| i.id != "X" && i.id != "Y"));
        assert_well_formed(&restored);
    }

    #[test]
    fn test_toggle_flowed_group_of_five_to_stacked() {
        let children: Vec<_> = (0..5)
            .map(|i| {
                let (x, y) = Direction::Flowed.place(i, 2);
                leaf(&format!("c{i}"), i, x, y)
            })
            .collect();
        let group = Group::new(children);
        let items = vec![LayoutItem::group("G", group, 0, 0, 2, 3)];
        let next = toggle_group(&items, "G").unwrap();

        let group = next[0].as_group().unwrap();
        assert_eq!(group.direction, Direction::Stacked);
        let cells: Vec<_> = group.items.iter().map(|i| (i.x, i.y)).collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)]);
        assert_eq!(next[0].h, 6);

        // Taller groups keep their height.
        let tall = vec![LayoutItem { h: 9, ..items[0].clone() }];
        assert_eq!(toggle_group(&tall, "G").unwrap()[0].h, 9);
    }

    #[test]
    fn test_toggle_back_to_flowed() {
        let mut group = Group::new((0..3).map(|i| leaf(&format!("c{i}"), i, 0, i as u32)).collect());
        group.direction = Direction::Stacked;
        let items = vec![LayoutItem::group("G", group, 0, 0, 2, 4)];
        let next = toggle_group(&items, "G").unwrap();
        let cells: Vec<_> = next[0].as_group().unwrap().items.iter().map(|i| (i.x, i.y)).collect();
        assert_eq!(cells, vec![(0, 0), (1, 0), (0, 1)]);
        assert_well_formed(&next);
    }

    #[test]
    fn test_toggle_leaf_is_no_op() {
        let items = vec![leaf("A", 0, 0, 0)];
        assert!(toggle_group(&items, "A").is_none());
        assert!(toggle_group(&items, "B").is_none());
    }

    #[test]
    fn test_reflow_root() {
        let items: Vec<_> = (0..5).map(|i| leaf(&format!("r{i}"), i, 0, i as u32)).collect();
        let flowed = reflow(&items, Direction::Flowed, 4);
        let cells: Vec<_> = flowed.iter().map(|i| (i.x, i.y)).collect();
        assert_eq!(cells, vec![(0, 0), (1, 0), (2, 0), (3, 0), (0, 1)]);
    }

    #[test]
    fn test_group_padding_stays_in_bounds() {
        let items = vec![LayoutItem::group("G", Group::new(vec![]), 0, 0, 2, 3)];
        let mut current = items;
        for _ in 0..40 {
            if let Some(next) = adjust_group_padding(&current, "G", 2) {
                current = next;
            }
        }
        assert_eq!(current[0].as_group().unwrap().padding, 32);
        assert!(adjust_group_padding(&current, "G", 2).is_none());
        let lowered = adjust_group_padding(&current, "G", -100).unwrap();
        assert_eq!(lowered[0].as_group().unwrap().padding, 0);
        assert!(adjust_group_padding(&lowered, "missing", 2).is_none());
    }

    #[test]
    fn test_merge_renderer_layout_rounds_and_keeps_payload() {
        let group = Group::new(vec![leaf("c", 3, 0, 0)]);
        let items = vec![leaf("A", 0, 0, 0), LayoutItem::group("G", group.clone(), 1, 0, 2, 3)];
        let cells = vec![
            RendererCell::new("G", 2.4, 0.6, 2.0, 3.2),
            RendererCell::new("ghost", 0.0, 0.0, 1.0, 1.0),
        ];
        let next = merge_renderer_layout(&items, &cells).unwrap();
        assert_eq!(next.len(), 2);
        assert_eq!(next[0], items[0]);
        assert_eq!((next[1].x, next[1].y, next[1].w, next[1].h), (2, 1, 2, 3));
        assert_eq!(next[1].content, ItemContent::Group(group));
    }

    #[test]
    fn test_merge_renderer_layout_unchanged_is_none() {
        let items = vec![leaf("A", 0, 0, 0)];
        let cells = vec![RendererCell::new("A", 0.2, -0.3, 1.0, 0.0)];
        assert!(merge_renderer_layout(&items, &cells).is_none());
    }
}
