use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use progress_core::cache::BoundedTtlCache;
use progress_core::model::{ScopeKey, UnitId};
use progress_core::time::Clock;
use remote::ProgressReadStore;

use crate::error::FetchError;

const DEFAULT_CACHE_ENTRIES: usize = 64;
const DEFAULT_CACHE_AGE_SECS: i64 = 5 * 60;

/// Read-through, deduplicating fetcher for remote progress.
///
/// Repeated reads for the same unit set within the cache window cost one
/// outbound call. The cache key is derived from the scope and the sorted
/// unique unit ids, so only exact-set matches share an entry: two requests
/// with overlapping but different sets each go to the store. That is a
/// known, accepted limitation of the derivation, kept as-is.
pub struct ProgressFetchService {
    reads: Arc<dyn ProgressReadStore>,
    cache: Mutex<BoundedTtlCache<String, HashMap<UnitId, bool>>>,
}

impl ProgressFetchService {
    /// Create a fetcher with the default cache bounds (64 entries, 5 min).
    #[must_use]
    pub fn new(reads: Arc<dyn ProgressReadStore>) -> Self {
        Self::with_cache(
            reads,
            DEFAULT_CACHE_ENTRIES,
            Duration::seconds(DEFAULT_CACHE_AGE_SECS),
        )
    }

    #[must_use]
    pub fn with_cache(reads: Arc<dyn ProgressReadStore>, max_entries: usize, max_age: Duration) -> Self {
        Self {
            reads,
            cache: Mutex::new(BoundedTtlCache::new(max_entries, max_age)),
        }
    }

    /// Override the cache clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(self, clock: Clock) -> Self {
        let cache = match self.cache.into_inner() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self {
            reads: self.reads,
            cache: Mutex::new(cache.with_clock(clock)),
        }
    }

    /// Fetch completion flags for a set of units, deduplicating the set and
    /// serving repeats from the cache.
    ///
    /// A failed remote read propagates to the caller and never populates
    /// the cache.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Remote` if the store read fails.
    pub async fn fetch(
        &self,
        scope: &ScopeKey,
        units: &[UnitId],
    ) -> Result<HashMap<UnitId, bool>, FetchError> {
        let mut unique: Vec<UnitId> = units.to_vec();
        unique.sort();
        unique.dedup();

        let key = cache_key(scope, &unique);
        if let Some(hit) = self.cache_get(&key)? {
            return Ok(hit);
        }

        let fetched = self.reads.read_progress(scope, &unique).await?;
        self.cache_put(key, fetched.clone())?;
        Ok(fetched)
    }

    /// Drop every cached result, forcing the next fetch through to the
    /// store. Used on logout and after bulk imports.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Poisoned` if the cache lock is poisoned.
    pub fn invalidate(&self) -> Result<(), FetchError> {
        self.cache
            .lock()
            .map_err(|e| FetchError::Poisoned(e.to_string()))?
            .clear();
        Ok(())
    }

    fn cache_get(&self, key: &String) -> Result<Option<HashMap<UnitId, bool>>, FetchError> {
        Ok(self
            .cache
            .lock()
            .map_err(|e| FetchError::Poisoned(e.to_string()))?
            .get(key))
    }

    fn cache_put(&self, key: String, value: HashMap<UnitId, bool>) -> Result<(), FetchError> {
        self.cache
            .lock()
            .map_err(|e| FetchError::Poisoned(e.to_string()))?
            .insert(key, value);
        Ok(())
    }
}

fn cache_key(scope: &ScopeKey, sorted_units: &[UnitId]) -> String {
    let ids = sorted_units
        .iter()
        .map(UnitId::as_str)
        .collect::<Vec<_>>()
        .join(",");
    format!("{scope}|{ids}")
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::ScopeType;
    use remote::InMemoryProgressStore;

    fn units(ids: &[&str]) -> Vec<UnitId> {
        ids.iter().map(|id| UnitId::new(*id)).collect()
    }

    fn scope() -> ScopeKey {
        ScopeKey::new(ScopeType::Book, "b1")
    }

    #[tokio::test]
    async fn duplicates_collapse_to_one_sorted_request() {
        let store = InMemoryProgressStore::new();
        store.seed(scope(), [(UnitId::new("a"), true)]);
        let service = ProgressFetchService::new(Arc::new(store.clone()));

        let flags = service
            .fetch(&scope(), &units(&["a", "b", "a", "c"]))
            .await
            .unwrap();

        assert_eq!(flags.get(&UnitId::new("a")), Some(&true));
        let calls = store.read_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, units(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn identical_set_is_served_from_cache() {
        let store = InMemoryProgressStore::new();
        let service = ProgressFetchService::new(Arc::new(store.clone()));

        service.fetch(&scope(), &units(&["a", "b"])).await.unwrap();
        // Order and duplication differ, the deduplicated sorted set does not.
        service.fetch(&scope(), &units(&["b", "a", "b"])).await.unwrap();

        assert_eq!(store.read_calls().len(), 1);
    }

    #[tokio::test]
    async fn overlapping_but_different_sets_do_not_share() {
        let store = InMemoryProgressStore::new();
        let service = ProgressFetchService::new(Arc::new(store.clone()));

        service.fetch(&scope(), &units(&["a", "b"])).await.unwrap();
        service.fetch(&scope(), &units(&["a", "b", "c"])).await.unwrap();

        assert_eq!(store.read_calls().len(), 2);
    }

    #[tokio::test]
    async fn failed_read_propagates_and_is_not_cached() {
        let store = InMemoryProgressStore::new();
        let service = ProgressFetchService::new(Arc::new(store.clone()));

        store.fail_reads(true);
        let err = service.fetch(&scope(), &units(&["a"])).await.unwrap_err();
        assert!(matches!(err, FetchError::Remote(_)));

        // Once the store recovers the same set goes out again.
        store.fail_reads(false);
        service.fetch(&scope(), &units(&["a"])).await.unwrap();
        assert_eq!(store.read_calls().len(), 2);
    }

    #[tokio::test]
    async fn expired_entry_goes_back_to_the_store() {
        use progress_core::time::fixed_clock;

        let store = InMemoryProgressStore::new();
        let service =
            ProgressFetchService::with_cache(Arc::new(store.clone()), 8, Duration::seconds(30))
                .with_clock(fixed_clock());

        service.fetch(&scope(), &units(&["a"])).await.unwrap();
        service
            .cache
            .lock()
            .unwrap()
            .advance_clock(Duration::seconds(31));
        service.fetch(&scope(), &units(&["a"])).await.unwrap();

        assert_eq!(store.read_calls().len(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let store = InMemoryProgressStore::new();
        let service = ProgressFetchService::new(Arc::new(store.clone()));

        service.fetch(&scope(), &units(&["a"])).await.unwrap();
        service.invalidate().unwrap();
        service.fetch(&scope(), &units(&["a"])).await.unwrap();

        assert_eq!(store.read_calls().len(), 2);
    }
}
