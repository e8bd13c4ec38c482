mod completion;
mod ids;
mod node;
mod stats;

pub use completion::CompletionMap;
pub use ids::{ParseScopeTypeError, ScopeId, ScopeKey, ScopeType, UnitId};
pub use node::{ContentNode, ContentTree, NodeDraft, TreeDraft, TreeError, UnitPolicy};
pub use stats::{ProgressStats, StatsError};
