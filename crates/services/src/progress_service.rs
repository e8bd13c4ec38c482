use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use progress_core::aggregate::aggregate;
use progress_core::model::{
    CompletionMap, ContentTree, ProgressStats, ScopeKey, ScopeType, UnitId,
};
use progress_core::time::Clock;
use remote::{ProgressWriteStore, WritePayload};

use crate::error::ProgressError;
use crate::hydration::HydrationSnapshot;
use crate::notify::{ChangeNotifier, ChangeOutcome, ProgressEvent};
use crate::sync::{PendingWrite, RollbackSnapshot, SyncDispatcher};

/// Whether a mutation is handed to the dispatcher for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Queue a background write (the normal path).
    Background,
    /// Apply locally only; used for bulk imports of legacy data that the
    /// remote store already holds.
    Skip,
}

struct ScopeState {
    tree: Option<ContentTree>,
    completion: CompletionMap,
    stats: ProgressStats,
}

/// Optimistic mutation coordinator.
///
/// All local mutation is synchronous: a completion change lands in the
/// scope's map and its stats are recomputed before the mutating call
/// returns, so a read immediately afterwards always observes post-mutation
/// state. Persistence happens later through the dispatcher; a failed write
/// restores the exact pre-mutation map and stats and surfaces the failure
/// on the notification channel. Failed writes are not retried.
pub struct ProgressTracker {
    clock: Clock,
    state: Mutex<HashMap<ScopeKey, ScopeState>>,
    dispatcher: SyncDispatcher,
    notifier: ChangeNotifier,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(writes: Arc<dyn ProgressWriteStore>) -> Self {
        Self {
            clock: Clock::default(),
            state: Mutex::new(HashMap::new()),
            dispatcher: SyncDispatcher::new(writes),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The engine's notification channel.
    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Shorthand for `notifier().subscribe()`.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProgressEvent> {
        self.notifier.subscribe()
    }

    //
    // ─── READS ─────────────────────────────────────────────────────────────
    //

    /// Current stats for a scope, if it has been touched this session.
    #[must_use]
    pub fn stats(&self, scope: &ScopeKey) -> Option<ProgressStats> {
        self.state.lock().ok()?.get(scope).map(|entry| entry.stats)
    }

    /// Snapshot of a scope's completion map.
    #[must_use]
    pub fn completion(&self, scope: &ScopeKey) -> Option<CompletionMap> {
        self.state
            .lock()
            .ok()?
            .get(scope)
            .map(|entry| entry.completion.clone())
    }

    /// Number of writes waiting for `sync`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if the queue lock is poisoned.
    pub fn pending_writes(&self) -> Result<usize, ProgressError> {
        self.dispatcher.pending_scopes()
    }

    //
    // ─── MUTATIONS (SYNCHRONOUS, OPTIMISTIC) ───────────────────────────────
    //

    /// Install or replace the content tree for a scope and recompute its
    /// stats against whatever completion state already exists.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if the state lock is poisoned.
    pub fn register_tree(
        &self,
        scope: ScopeKey,
        tree: ContentTree,
    ) -> Result<ProgressStats, ProgressError> {
        let now = self.clock.now();
        let mut state = self.lock_state()?;
        let entry = state.entry(scope).or_insert_with(|| ScopeState {
            tree: None,
            completion: CompletionMap::new(),
            stats: ProgressStats::zero(now),
        });
        entry.stats = aggregate(&tree, &entry.completion, now);
        entry.tree = Some(tree);
        Ok(entry.stats)
    }

    /// Flip one unit's completion flag and queue a background write.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if a lock is poisoned.
    pub fn toggle(&self, scope: &ScopeKey, unit: UnitId) -> Result<ProgressStats, ProgressError> {
        let currently = self
            .completion(scope)
            .is_some_and(|map| map.is_completed(&unit));
        self.set_many(scope, vec![(unit, !currently)], SyncMode::Background)
    }

    /// Apply a batch of completion changes to one scope.
    ///
    /// The pre-mutation map and stats are snapshotted for rollback, the
    /// changes land synchronously, stats are recomputed, and (unless
    /// `SyncMode::Skip`) a pending write is queued for the dispatcher. The
    /// returned stats are immediately readable via `stats`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if a lock is poisoned.
    pub fn set_many(
        &self,
        scope: &ScopeKey,
        changes: Vec<(UnitId, bool)>,
        mode: SyncMode,
    ) -> Result<ProgressStats, ProgressError> {
        let now = self.clock.now();
        let (stats, rollback) = {
            let mut state = self.lock_state()?;
            let entry = state.entry(scope.clone()).or_insert_with(|| ScopeState {
                tree: None,
                completion: CompletionMap::new(),
                stats: ProgressStats::zero(now),
            });

            let rollback = RollbackSnapshot {
                completion: entry.completion.clone(),
                stats: entry.stats,
            };

            for (unit, completed) in &changes {
                entry.completion.set(unit.clone(), *completed);
            }
            entry.stats = match &entry.tree {
                Some(tree) => aggregate(tree, &entry.completion, now),
                // No tree registered yet: counts cannot be derived, keep the
                // last known values with a fresh timestamp.
                None => ProgressStats {
                    last_updated: now,
                    ..entry.stats
                },
            };
            (entry.stats, rollback)
        };

        match mode {
            SyncMode::Background => {
                self.dispatcher.enqueue(PendingWrite {
                    scope: scope.clone(),
                    payload: WritePayload::from_changes(changes).with_stats(stats),
                    rollback,
                })?;
            }
            SyncMode::Skip => {
                // Nothing goes to the remote store; views still refresh.
                self.notifier.publish(ProgressEvent {
                    scope: scope.clone(),
                    stats: Some(stats),
                    outcome: ChangeOutcome::Updated,
                });
            }
        }
        Ok(stats)
    }

    /// Apply an ordered list of legacy `(unit, completed)` pairs without
    /// writing to the remote store, which already holds them.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if a lock is poisoned.
    pub fn import_legacy(
        &self,
        scope: &ScopeKey,
        pairs: Vec<(UnitId, bool)>,
    ) -> Result<ProgressStats, ProgressError> {
        self.set_many(scope, pairs, SyncMode::Skip)
    }

    /// Merge a session-start snapshot into local state.
    ///
    /// Remote flags fill units with no local entry; local optimistic values
    /// win. Stats are recomputed where a tree is registered and otherwise
    /// taken from the snapshot for scopes the session has not touched.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if the state lock is poisoned.
    pub fn hydrate(
        &self,
        scope_type: ScopeType,
        snapshot: HydrationSnapshot,
    ) -> Result<(), ProgressError> {
        let now = self.clock.now();
        let mut events = Vec::new();
        {
            let mut state = self.lock_state()?;
            for (scope_id, scope_snapshot) in snapshot.scopes {
                let scope = ScopeKey::new(scope_type, scope_id);
                let entry = state.entry(scope.clone()).or_insert_with(|| ScopeState {
                    tree: None,
                    completion: CompletionMap::new(),
                    stats: ProgressStats::zero(now),
                });

                let untouched = entry.completion.is_empty();
                entry.completion.merge_remote(scope_snapshot.progress);
                entry.stats = match (&entry.tree, scope_snapshot.stats) {
                    (Some(tree), _) => aggregate(tree, &entry.completion, now),
                    (None, Some(remote_stats)) if untouched => remote_stats,
                    (None, _) => ProgressStats {
                        last_updated: now,
                        ..entry.stats
                    },
                };
                events.push(ProgressEvent {
                    scope,
                    stats: Some(entry.stats),
                    outcome: ChangeOutcome::Updated,
                });
            }
        }
        for event in events {
            self.notifier.publish(event);
        }
        Ok(())
    }

    /// Drop every scope's state and all queued writes (logout / clear all
    /// data).
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Poisoned` if a lock is poisoned.
    pub fn clear(&self) -> Result<(), ProgressError> {
        self.lock_state()?.clear();
        self.dispatcher.clear()
    }

    //
    // ─── SYNCHRONIZATION (ASYNC) ───────────────────────────────────────────
    //

    /// Flush the pending write for one scope, if any.
    ///
    /// # Errors
    ///
    /// Returns the write's `RemoteError` after rollback and notification.
    pub async fn sync(&self, scope: &ScopeKey) -> Result<(), ProgressError> {
        match self.dispatcher.take_scope(scope)? {
            Some(write) => self.complete(write).await,
            None => Ok(()),
        }
    }

    /// Flush every pending write in enqueue order.
    ///
    /// Each scope is written independently; one failed scope does not stop
    /// the others. The first error is returned after all scopes have been
    /// attempted and all failures rolled back and notified.
    ///
    /// # Errors
    ///
    /// Returns the first write failure, if any.
    pub async fn sync_all(&self) -> Result<(), ProgressError> {
        let mut first_error = None;
        for write in self.dispatcher.take_all()? {
            if let Err(err) = self.complete(write).await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn complete(&self, write: PendingWrite) -> Result<(), ProgressError> {
        match self.dispatcher.dispatch(&write).await {
            Ok(()) => {
                self.notifier.publish(ProgressEvent {
                    scope: write.scope.clone(),
                    stats: self.stats(&write.scope),
                    outcome: ChangeOutcome::Updated,
                });
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.lock_state()?;
                    if let Some(entry) = state.get_mut(&write.scope) {
                        entry.completion = write.rollback.completion;
                        entry.stats = write.rollback.stats;
                    }
                }
                self.notifier.publish(ProgressEvent {
                    scope: write.scope.clone(),
                    stats: self.stats(&write.scope),
                    outcome: ChangeOutcome::SyncFailed(err.to_string()),
                });
                Err(err.into())
            }
        }
    }

    fn lock_state(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ScopeKey, ScopeState>>, ProgressError> {
        self.state
            .lock()
            .map_err(|e| ProgressError::Poisoned(e.to_string()))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
