use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use progress_core::model::{ProgressStats, ScopeKey, UnitId};

/// Errors surfaced by remote store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("remote rejected request with status {0}")]
    Rejected(u16),
}

/// Partial write describing changed units for one scope.
///
/// The remote store accepts partial payloads, so a payload carries only the
/// units that changed plus, optionally, the freshly computed stats. Payloads
/// for the same scope coalesce via `merge`; writes are idempotent per unit,
/// so repeating a merged payload is safe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritePayload {
    #[serde(default)]
    pub completed: BTreeMap<UnitId, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProgressStats>,
}

impl WritePayload {
    #[must_use]
    pub fn for_unit(unit: UnitId, completed: bool) -> Self {
        Self {
            completed: BTreeMap::from([(unit, completed)]),
            stats: None,
        }
    }

    #[must_use]
    pub fn from_changes(changes: impl IntoIterator<Item = (UnitId, bool)>) -> Self {
        Self {
            completed: changes.into_iter().collect(),
            stats: None,
        }
    }

    #[must_use]
    pub fn with_stats(mut self, stats: ProgressStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Fold a later payload into this one: union of changed units, the later
    /// change winning per unit, the later stats winning when present.
    pub fn merge(&mut self, later: WritePayload) {
        self.completed.extend(later.completed);
        if later.stats.is_some() {
            self.stats = later.stats;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.stats.is_none()
    }
}

/// Read side of the remote progress store. Idempotent, side-effect-free.
#[async_trait]
pub trait ProgressReadStore: Send + Sync {
    /// Fetch persisted completion flags for the given units of a scope.
    ///
    /// Units the store has never seen are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the store cannot be reached.
    async fn read_progress(
        &self,
        scope: &ScopeKey,
        units: &[UnitId],
    ) -> Result<HashMap<UnitId, bool>, RemoteError>;
}

/// Write side of the remote progress store.
#[async_trait]
pub trait ProgressWriteStore: Send + Sync {
    /// Persist a partial payload for a scope.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the write does not reach the store.
    async fn write_progress(&self, scope: &ScopeKey, payload: &WritePayload)
        -> Result<(), RemoteError>;
}

//
// ─── IN-MEMORY STORE ───────────────────────────────────────────────────────────
//

#[derive(Default)]
struct InMemoryState {
    progress: HashMap<ScopeKey, BTreeMap<UnitId, bool>>,
    read_calls: Vec<(ScopeKey, Vec<UnitId>)>,
    write_calls: Vec<(ScopeKey, WritePayload)>,
    fail_reads: bool,
    fail_writes: bool,
}

/// In-memory store implementation for testing and prototyping.
///
/// Records every call and supports failure injection so tests can assert
/// batch deduplication and optimistic rollback.
#[derive(Clone, Default)]
pub struct InMemoryProgressStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail with a connection error.
    pub fn fail_reads(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_reads = fail;
        }
    }

    /// Make every subsequent write fail with a connection error.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_writes = fail;
        }
    }

    /// Seed persisted flags for a scope.
    pub fn seed(&self, scope: ScopeKey, flags: impl IntoIterator<Item = (UnitId, bool)>) {
        if let Ok(mut state) = self.state.lock() {
            state.progress.entry(scope).or_default().extend(flags);
        }
    }

    /// Every read issued so far, in order, with the unit set as requested.
    #[must_use]
    pub fn read_calls(&self) -> Vec<(ScopeKey, Vec<UnitId>)> {
        self.state.lock().map(|s| s.read_calls.clone()).unwrap_or_default()
    }

    /// Every successful or failed write attempt issued so far, in order.
    #[must_use]
    pub fn write_calls(&self) -> Vec<(ScopeKey, WritePayload)> {
        self.state.lock().map(|s| s.write_calls.clone()).unwrap_or_default()
    }

    /// Currently persisted flags for a scope.
    #[must_use]
    pub fn persisted(&self, scope: &ScopeKey) -> BTreeMap<UnitId, bool> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.progress.get(scope).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressReadStore for InMemoryProgressStore {
    async fn read_progress(
        &self,
        scope: &ScopeKey,
        units: &[UnitId],
    ) -> Result<HashMap<UnitId, bool>, RemoteError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        state.read_calls.push((scope.clone(), units.to_vec()));
        if state.fail_reads {
            return Err(RemoteError::Connection("injected read failure".into()));
        }
        let stored = state.progress.get(scope);
        Ok(units
            .iter()
            .filter_map(|unit| {
                stored
                    .and_then(|flags| flags.get(unit).copied())
                    .map(|flag| (unit.clone(), flag))
            })
            .collect())
    }
}

#[async_trait]
impl ProgressWriteStore for InMemoryProgressStore {
    async fn write_progress(
        &self,
        scope: &ScopeKey,
        payload: &WritePayload,
    ) -> Result<(), RemoteError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        state.write_calls.push((scope.clone(), payload.clone()));
        if state.fail_writes {
            return Err(RemoteError::Connection("injected write failure".into()));
        }
        let flags = state.progress.entry(scope.clone()).or_default();
        for (unit, completed) in &payload.completed {
            flags.insert(unit.clone(), *completed);
        }
        Ok(())
    }
}

/// Aggregates read and write stores behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Remote {
    pub reads: Arc<dyn ProgressReadStore>,
    pub writes: Arc<dyn ProgressWriteStore>,
}

impl Remote {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(InMemoryProgressStore::new())
    }

    /// Wrap one concrete store serving both sides.
    #[must_use]
    pub fn from_store<S>(store: S) -> Self
    where
        S: ProgressReadStore + ProgressWriteStore + Clone + 'static,
    {
        let reads: Arc<dyn ProgressReadStore> = Arc::new(store.clone());
        let writes: Arc<dyn ProgressWriteStore> = Arc::new(store);
        Self { reads, writes }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
