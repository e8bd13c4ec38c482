//! Session-start hydration snapshot.
//!
//! The content service hands the client one structure per content type at
//! login, keyed by scope id. Field names vary by content type on the wire
//! (`progress`, `tocProgress`, `chapterCompletion`), covered here with
//! serde aliases so one type reads them all.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use progress_core::model::{ProgressStats, ScopeId, UnitId};

/// Snapshot for every scope of one content type, keyed by scope id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HydrationSnapshot {
    pub scopes: BTreeMap<ScopeId, ScopeSnapshot>,
}

impl HydrationSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Persisted state for a single scope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeSnapshot {
    /// Persisted completion flags. Merged into local state with local
    /// optimistic values winning.
    #[serde(
        default,
        alias = "tocProgress",
        alias = "chapterCompletion",
        alias = "toc_progress",
        alias = "chapter_completion"
    )]
    pub progress: BTreeMap<UnitId, bool>,

    /// Server-side stats, used only for scopes with no registered tree
    /// (stats are otherwise recomputed locally).
    #[serde(default, alias = "progressStats", alias = "progress_stats")]
    pub stats: Option<ProgressStats>,

    /// Opaque presentation metadata, carried through untouched.
    #[serde(default)]
    pub metadata: Option<Value>,
}
