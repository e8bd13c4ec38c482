#![forbid(unsafe_code)]

pub mod aggregate;
pub mod cache;
pub mod model;
pub mod time;

pub use aggregate::aggregate;
pub use cache::BoundedTtlCache;
pub use model::{
    CompletionMap, ContentNode, ContentTree, NodeDraft, ProgressStats, ScopeId, ScopeKey,
    ScopeType, StatsError, TreeDraft, TreeError, UnitId, UnitPolicy,
};
pub use time::Clock;
