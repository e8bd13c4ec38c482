//! Shared error types for the services crate.

use thiserror::Error;

use progress_core::model::TreeError;
use remote::RemoteError;

/// Errors emitted by `ProgressFetchService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("cache state poisoned: {0}")]
    Poisoned(String),
}

/// Errors emitted by `ProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("engine state poisoned: {0}")]
    Poisoned(String),
}
