//! Synchronization dispatcher.
//!
//! Queues optimistic mutations per (content-type, content-id) and forwards
//! them to the remote store. Writes queued for the same scope before a
//! flush coalesce into a single outbound call carrying the union of their
//! changes and the earliest rollback snapshot, so a failed merged write
//! reverts everything it carried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use progress_core::model::{CompletionMap, ProgressStats, ScopeKey};
use remote::{ProgressWriteStore, RemoteError, WritePayload};

use crate::error::ProgressError;

/// State captured before an optimistic mutation, restored on a failed sync.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackSnapshot {
    pub completion: CompletionMap,
    pub stats: ProgressStats,
}

/// A queued remote mutation for one scope.
///
/// Created when a mutation is applied locally, resolved or rolled back when
/// the outbound write completes; never persisted beyond the session.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub scope: ScopeKey,
    pub payload: WritePayload,
    pub rollback: RollbackSnapshot,
}

pub struct SyncDispatcher {
    writes: Arc<dyn ProgressWriteStore>,
    pending: Mutex<PendingQueue>,
}

#[derive(Default)]
struct PendingQueue {
    by_scope: HashMap<ScopeKey, PendingWrite>,
    order: Vec<ScopeKey>,
}

impl SyncDispatcher {
    #[must_use]
    pub fn new(writes: Arc<dyn ProgressWriteStore>) -> Self {
        Self {
            writes,
            pending: Mutex::new(PendingQueue::default()),
        }
    }

    /// Queue a write, coalescing with any write already pending for the
    /// same scope. The earlier rollback snapshot is kept: if the merged
    /// write fails, state reverts to before the first of the coalesced
    /// mutations.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if the queue lock is poisoned.
    pub fn enqueue(&self, write: PendingWrite) -> Result<(), ProgressError> {
        let mut queue = self
            .pending
            .lock()
            .map_err(|e| ProgressError::Poisoned(e.to_string()))?;
        match queue.by_scope.get_mut(&write.scope) {
            Some(existing) => existing.payload.merge(write.payload),
            None => {
                queue.order.push(write.scope.clone());
                queue.by_scope.insert(write.scope.clone(), write);
            }
        }
        Ok(())
    }

    /// Remove and return the pending write for one scope, if any.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if the queue lock is poisoned.
    pub fn take_scope(&self, scope: &ScopeKey) -> Result<Option<PendingWrite>, ProgressError> {
        let mut queue = self
            .pending
            .lock()
            .map_err(|e| ProgressError::Poisoned(e.to_string()))?;
        queue.order.retain(|key| key != scope);
        Ok(queue.by_scope.remove(scope))
    }

    /// Remove and return every pending write in enqueue order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if the queue lock is poisoned.
    pub fn take_all(&self) -> Result<Vec<PendingWrite>, ProgressError> {
        let mut queue = self
            .pending
            .lock()
            .map_err(|e| ProgressError::Poisoned(e.to_string()))?;
        let order = std::mem::take(&mut queue.order);
        Ok(order
            .into_iter()
            .filter_map(|scope| queue.by_scope.remove(&scope))
            .collect())
    }

    /// Perform the outbound write for one dequeued mutation.
    ///
    /// # Errors
    ///
    /// Returns the store's `RemoteError` unchanged; the caller decides how
    /// to roll back and notify.
    pub async fn dispatch(&self, write: &PendingWrite) -> Result<(), RemoteError> {
        self.writes.write_progress(&write.scope, &write.payload).await
    }

    /// Number of scopes with a queued write.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if the queue lock is poisoned.
    pub fn pending_scopes(&self) -> Result<usize, ProgressError> {
        Ok(self
            .pending
            .lock()
            .map_err(|e| ProgressError::Poisoned(e.to_string()))?
            .by_scope
            .len())
    }

    /// Drop all queued writes without sending them.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if the queue lock is poisoned.
    pub fn clear(&self) -> Result<(), ProgressError> {
        let mut queue = self
            .pending
            .lock()
            .map_err(|e| ProgressError::Poisoned(e.to_string()))?;
        queue.by_scope.clear();
        queue.order.clear();
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::{ScopeType, UnitId};
    use progress_core::time::fixed_now;
    use remote::InMemoryProgressStore;

    fn snapshot() -> RollbackSnapshot {
        RollbackSnapshot {
            completion: CompletionMap::new(),
            stats: ProgressStats::zero(fixed_now()),
        }
    }

    fn write(scope: &ScopeKey, unit: &str, completed: bool) -> PendingWrite {
        PendingWrite {
            scope: scope.clone(),
            payload: WritePayload::for_unit(UnitId::new(unit), completed),
            rollback: snapshot(),
        }
    }

    #[tokio::test]
    async fn same_scope_writes_coalesce_into_one_call() {
        let store = InMemoryProgressStore::new();
        let dispatcher = SyncDispatcher::new(Arc::new(store.clone()));
        let scope = ScopeKey::new(ScopeType::Book, "b1");

        dispatcher.enqueue(write(&scope, "s1", true)).unwrap();
        dispatcher.enqueue(write(&scope, "s2", true)).unwrap();
        dispatcher.enqueue(write(&scope, "s1", false)).unwrap();
        assert_eq!(dispatcher.pending_scopes().unwrap(), 1);

        for queued in dispatcher.take_all().unwrap() {
            dispatcher.dispatch(&queued).await.unwrap();
        }

        let calls = store.write_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.completed.len(), 2);
        // Later change per unit wins.
        assert_eq!(calls[0].1.completed.get(&UnitId::new("s1")), Some(&false));
    }

    #[tokio::test]
    async fn different_scopes_stay_separate() {
        let store = InMemoryProgressStore::new();
        let dispatcher = SyncDispatcher::new(Arc::new(store.clone()));
        let book = ScopeKey::new(ScopeType::Book, "b1");
        let video = ScopeKey::new(ScopeType::Video, "v1");

        dispatcher.enqueue(write(&book, "s1", true)).unwrap();
        dispatcher.enqueue(write(&video, "ch1", true)).unwrap();

        let taken = dispatcher.take_all().unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].scope, book);
        assert_eq!(taken[1].scope, video);
    }

    #[test]
    fn take_scope_leaves_others_queued() {
        let dispatcher = SyncDispatcher::new(Arc::new(InMemoryProgressStore::new()));
        let book = ScopeKey::new(ScopeType::Book, "b1");
        let video = ScopeKey::new(ScopeType::Video, "v1");

        dispatcher.enqueue(write(&book, "s1", true)).unwrap();
        dispatcher.enqueue(write(&video, "ch1", true)).unwrap();

        let taken = dispatcher.take_scope(&book).unwrap();
        assert_eq!(taken.unwrap().scope, book);
        assert_eq!(dispatcher.pending_scopes().unwrap(), 1);
    }

    #[test]
    fn clear_drops_queued_writes() {
        let dispatcher = SyncDispatcher::new(Arc::new(InMemoryProgressStore::new()));
        let scope = ScopeKey::new(ScopeType::Book, "b1");

        dispatcher.enqueue(write(&scope, "s1", true)).unwrap();
        dispatcher.clear().unwrap();

        assert_eq!(dispatcher.pending_scopes().unwrap(), 0);
        assert!(dispatcher.take_all().unwrap().is_empty());
    }
}
