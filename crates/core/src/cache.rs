//! Bounded read-through cache with per-entry expiry.
//!
//! Eviction is FIFO over insertion order rather than LRU: cached values are
//! short-lived progress snapshots, so the next read-through repairs any
//! staleness a simpler eviction order introduces.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use crate::time::Clock;

struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

/// Generic key/value cache bounded by entry count and entry age.
///
/// Absent or expired keys are a normal `None`, never an error. Expiry is
/// checked passively on `get`; capacity is enforced eagerly on `insert` by
/// evicting the single oldest-inserted entry.
pub struct BoundedTtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    order: VecDeque<K>,
    max_size: usize,
    max_age: Duration,
    clock: Clock,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `max_size` entries, each readable for
    /// `max_age` after insertion.
    #[must_use]
    pub fn new(max_size: usize, max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_size: max_size.max(1),
            max_age,
            clock: Clock::default(),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Store a value stamped with the current time.
    ///
    /// At capacity, the oldest-inserted entry is evicted first. Re-inserting
    /// an existing key refreshes its timestamp and moves it to the back of
    /// the eviction order.
    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| *k != key);
        } else if self.entries.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                inserted_at: self.clock.now(),
            },
        );
        self.order.push_back(key);
    }

    /// Fetch a value if present and not older than `max_age`.
    ///
    /// An expired entry is removed as a side effect of the read.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let inserted_at = self.entries.get(key)?.inserted_at;
        if self.clock.now() - inserted_at > self.max_age {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance a fixed clock, for expiry tests.
    pub fn advance_clock(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
