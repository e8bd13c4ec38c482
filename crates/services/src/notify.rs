//! Scoped change notifications.
//!
//! Independently rendered views subscribe here instead of calling each
//! other: a sidebar and a reader pane showing the same book both refresh
//! from the same event. Successful updates and failed syncs flow through
//! the one channel, tagged by outcome, so a single subscription point
//! handles both.

use tokio::sync::broadcast;

use progress_core::model::{ProgressStats, ScopeKey};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// What happened to the scope this event describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Local state changed (and, for synced mutations, the remote write
    /// landed).
    Updated,
    /// A background write failed; local state has been rolled back.
    SyncFailed(String),
}

/// Fire-and-forget notification that a scope's progress changed.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub scope: ScopeKey,
    /// Stats as of the event: post-mutation for updates, post-rollback for
    /// failures, absent when the scope has no registered tree.
    pub stats: Option<ProgressStats>,
    pub outcome: ChangeOutcome,
}

/// Broadcast channel owned by the engine.
///
/// Publishing with no live subscribers is a no-op, never an error.
#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ChangeNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Open a new subscription; each receiver sees every event published
    /// after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ProgressEvent) {
        // A send error only means nobody is listening right now.
        let _ = self.sender.send(event);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
