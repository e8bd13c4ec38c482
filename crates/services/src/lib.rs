#![forbid(unsafe_code)]

pub mod error;
pub mod fetch_service;
pub mod hydration;
pub mod notify;
pub mod progress_service;
pub mod sync;

pub use progress_core::time::Clock;

pub use error::{FetchError, ProgressError};
pub use fetch_service::ProgressFetchService;
pub use hydration::{HydrationSnapshot, ScopeSnapshot};
pub use notify::{ChangeNotifier, ChangeOutcome, ProgressEvent};
pub use progress_service::{ProgressTracker, SyncMode};
pub use sync::{PendingWrite, RollbackSnapshot, SyncDispatcher};
