use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StatsError {
    #[error("completed units ({completed}) exceed total units ({total})")]
    CompletedExceedsTotal { completed: u32, total: u32 },
}

//
// ─── PROGRESS STATS ────────────────────────────────────────────────────────────
//

/// Aggregated completion statistics for one scope.
///
/// Derived data: always recomputable from a completion map and a content
/// tree, never a second source of truth. The constructor enforces
/// `completed_units <= total_units` and owns the percentage rule, so a
/// value of this type is valid by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total_units: u32,
    pub completed_units: u32,
    pub percentage: u8,
    pub last_updated: DateTime<Utc>,
}

impl ProgressStats {
    /// Build stats from unit counts, computing the percentage.
    ///
    /// Percentage is `round(100 * completed / total)` for a non-empty total
    /// and `0` otherwise, with one explicit edge rule: when every unit is
    /// complete the percentage is exactly 100, so rounding can never report
    /// 99% for finished content.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::CompletedExceedsTotal` if `completed > total`.
    pub fn new(
        total_units: u32,
        completed_units: u32,
        last_updated: DateTime<Utc>,
    ) -> Result<Self, StatsError> {
        if completed_units > total_units {
            return Err(StatsError::CompletedExceedsTotal {
                completed: completed_units,
                total: total_units,
            });
        }
        Ok(Self {
            total_units,
            completed_units,
            percentage: percentage_of(completed_units, total_units),
            last_updated,
        })
    }

    /// Zero-valued stats, used for empty or malformed content trees.
    #[must_use]
    pub fn zero(last_updated: DateTime<Utc>) -> Self {
        Self {
            total_units: 0,
            completed_units: 0,
            percentage: 0,
            last_updated,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_units > 0 && self.completed_units == self.total_units
    }
}

fn percentage_of(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    if completed == total {
        return 100;
    }
    // Integer rounding; bounded by the completed <= total invariant.
    let pct = (u64::from(completed) * 100 + u64::from(total) / 2) / u64::from(total);
    #[allow(clippy::cast_possible_truncation)]
    {
        pct as u8
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
