//! Hierarchical progress aggregation.
//!
//! Walks a content forest depth-first, counts each distinct unit id exactly
//! once according to the tree's `UnitPolicy`, and folds the completion map
//! into total/completed counts and a percentage.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::model::{CompletionMap, ContentNode, ContentTree, ProgressStats, UnitId, UnitPolicy};

/// Compute progress stats for one scope.
///
/// Duplicate ids anywhere in the forest contribute a single unit: the walk
/// keeps a global seen-set, and recursion continues into the children of an
/// already-seen node so fresh descendants under a repeated container are
/// still discovered. An empty forest yields zero stats.
#[must_use]
pub fn aggregate(tree: &ContentTree, completion: &CompletionMap, now: DateTime<Utc>) -> ProgressStats {
    let mut walk = Walk {
        completion,
        policy: tree.policy(),
        seen: HashSet::new(),
        total: 0,
        completed: 0,
    };
    for root in tree.roots() {
        walk.visit(root, 0);
    }
    // completed only ever increments alongside total, so the constructor
    // cannot fail here.
    ProgressStats::new(walk.total, walk.completed, now)
        .unwrap_or_else(|_| ProgressStats::zero(now))
}

struct Walk<'a> {
    completion: &'a CompletionMap,
    policy: UnitPolicy,
    seen: HashSet<&'a UnitId>,
    total: u32,
    completed: u32,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, node: &'a ContentNode, depth: usize) {
        if self.counts_as_unit(node, depth) && self.seen.insert(node.id()) {
            self.total += 1;
            if self.completion.is_completed(node.id()) {
                self.completed += 1;
            }
        }
        for child in node.children() {
            self.visit(child, depth + 1);
        }
    }

    fn counts_as_unit(&self, node: &ContentNode, depth: usize) -> bool {
        match self.policy {
            UnitPolicy::AllNodes => true,
            UnitPolicy::LeafNodes => node.is_leaf(),
            UnitPolicy::ChildrenOnly => depth > 0 && node.is_leaf(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
