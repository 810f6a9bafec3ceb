//! Fresh item ids for combine/uncombine.
//!
//! Ids are a source id (or fixed prefix) joined with a millisecond stamp.
//! The mint knows every id already in the tree and appends a counter when a
//! candidate is taken, so two operations in the same millisecond, or a
//! `-n` re-key of an id that was re-keyed before, still come out unique.

use std::time::{SystemTime, UNIX_EPOCH};

use rustc_hash::FxHashSet;

use crate::item::LayoutItem;
use crate::tree::collect_ids;

pub struct IdMint {
    taken: FxHashSet<String>,
    stamp: u64,
}

impl IdMint {
    /// Mint seeded with the ids of `items`, stamped with the current time.
    pub fn for_tree(items: &[LayoutItem]) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::with_stamp(collect_ids(items), stamp)
    }

    /// Deterministic mint (tests, replays).
    pub fn with_stamp(taken: FxHashSet<String>, stamp: u64) -> Self {
        Self { taken, stamp }
    }

    /// Reserve `candidate`, or the first free `candidate-2`, `candidate-3`, ...
    pub fn claim(&mut self, candidate: String) -> String {
        if self.taken.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 2u32;
        loop {
            let next = format!("{candidate}-{n}");
            if self.taken.insert(next.clone()) {
                return next;
            }
            n += 1;
        }
    }

    /// `{source}-n`: a leaf re-keyed into a new group.
    pub fn nested_child(&mut self, source: &str) -> String {
        self.claim(format!("{source}-n"))
    }

    /// `{source}-n-{stamp}`: an item appended into an existing group.
    pub fn appended_child(&mut self, source: &str) -> String {
        let candidate = format!("{source}-n-{}", self.stamp);
        self.claim(candidate)
    }

    /// `nested-{stamp}`: a group created by combining two leaves.
    pub fn group(&mut self) -> String {
        let candidate = format!("nested-{}", self.stamp);
        self.claim(candidate)
    }

    /// `item-{stamp}-{index}`: a child extracted from a group.
    pub fn extracted(&mut self, index: usize) -> String {
        let candidate = format!("item-{}-{index}", self.stamp);
        self.claim(candidate)
    }
}
