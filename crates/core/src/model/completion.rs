use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ids::UnitId;

/// Per-scope map from unit id to completion flag.
///
/// One map exists per (content-type, content-id) scope and is mutated only
/// through the mutation coordinator; a `clone()` of the map is the rollback
/// snapshot for an optimistic update. Units never touched by the user are
/// simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionMap {
    entries: BTreeMap<UnitId, bool>,
}

impl CompletionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a unit's completion flag, returning the previous flag if any.
    pub fn set(&mut self, unit: UnitId, completed: bool) -> Option<bool> {
        self.entries.insert(unit, completed)
    }

    /// Whether the unit is explicitly marked completed.
    #[must_use]
    pub fn is_completed(&self, unit: &UnitId) -> bool {
        self.entries.get(unit).copied().unwrap_or(false)
    }

    /// Whether the unit has any recorded flag, completed or not.
    #[must_use]
    pub fn contains(&self, unit: &UnitId) -> bool {
        self.entries.contains_key(unit)
    }

    /// Merge remotely persisted flags into this map.
    ///
    /// Remote values only fill units with no local entry; local optimistic
    /// state always wins, so an in-flight toggle is not clobbered by a
    /// hydration snapshot taken before it.
    pub fn merge_remote(&mut self, remote: impl IntoIterator<Item = (UnitId, bool)>) {
        for (unit, completed) in remote {
            self.entries.entry(unit).or_insert(completed);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, bool)> {
        self.entries.iter().map(|(unit, flag)| (unit, *flag))
    }
}

impl FromIterator<(UnitId, bool)> for CompletionMap {
    fn from_iter<I: IntoIterator<Item = (UnitId, bool)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
