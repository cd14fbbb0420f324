//! # Tracker Cache
//!
//! LRU cache backing the cache-aside tracker lookup on the redirect path.
//!
//! The cache is best effort. A miss falls through to the [`Store`](crate::Store)
//! and the caller inserts what it read; writers invalidate or patch the entry
//! they touched. Nothing in the cache is ever the only copy of a row.
//!
//! Recency uses a logical clock (a monotonic counter), not wall time, so
//! eviction order is reproducible in tests.

use crate::{Tracker, TrackerId};
use std::collections::BTreeMap;

/// Default maximum number of cached trackers.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Default number of entries evicted when the cache is full.
pub const DEFAULT_EVICTION_BATCH: usize = 100;

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    last_access: u64,
}

/// LRU cache with batch eviction and hit/miss counters.
#[derive(Debug)]
pub struct LruCache<K: Ord + Clone, V: Clone> {
    entries: BTreeMap<K, Slot<V>>,
    max_size: usize,
    eviction_batch: usize,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl<K: Ord + Clone, V: Clone> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl<K: Ord + Clone, V: Clone> LruCache<K, V> {
    /// Create a cache holding at most `max_size` entries (at least 1).
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: BTreeMap::new(),
            max_size,
            eviction_batch: DEFAULT_EVICTION_BATCH.min(max_size),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Set how many entries are dropped per eviction.
    #[must_use]
    pub fn with_eviction_batch(mut self, batch_size: usize) -> Self {
        self.eviction_batch = batch_size.max(1);
        self
    }

    fn tick(&mut self) -> u64 {
        self.clock = self.clock.saturating_add(1);
        self.clock
    }

    /// Look up a value, refreshing its recency on a hit.
    ///
    /// Returns a clone so callers can release any lock around the cache.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.tick();
        match self.entries.get_mut(key) {
            Some(slot) => {
                slot.last_access = now;
                self.hits = self.hits.saturating_add(1);
                Some(slot.value.clone())
            }
            None => {
                self.misses = self.misses.saturating_add(1);
                None
            }
        }
    }

    /// Insert or replace a value, evicting the least recently used entries
    /// when the cache is full.
    pub fn insert(&mut self, key: K, value: V) {
        let now = self.tick();
        if self.entries.len() >= self.max_size && !self.entries.contains_key(&key) {
            self.evict();
        }
        self.entries.insert(
            key,
            Slot {
                value,
                last_access: now,
            },
        );
    }

    /// Modify a cached value in place. Returns `false` when `key` is absent.
    ///
    /// Recency and hit counters are left alone.
    pub fn update(&mut self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                f(&mut slot.value);
                true
            }
            None => false,
        }
    }

    /// Drop a key. Returns the removed value.
    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|slot| slot.value)
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits.saturating_add(self.misses);
        let hit_rate_percent = if lookups == 0 {
            0
        } else {
            (self.hits.saturating_mul(100) / lookups) as u8
        };
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            hits: self.hits,
            misses: self.misses,
            hit_rate_percent,
        }
    }

    fn evict(&mut self) {
        let mut by_age: Vec<(u64, K)> = self
            .entries
            .iter()
            .map(|(key, slot)| (slot.last_access, key.clone()))
            .collect();
        by_age.sort_by(|a, b| a.0.cmp(&b.0));

        for (_, key) in by_age.into_iter().take(self.eviction_batch) {
            self.entries.remove(&key);
        }
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Integer percentage, 0-100.
    pub hit_rate_percent: u8,
}

/// Cache of trackers by id.
pub type TrackerCache = LruCache<TrackerId, Tracker>;

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(id: u64) -> Tracker {
        Tracker {
            id: TrackerId(id),
            url: format!("https://example.org/{id}"),
            count: 0,
            user: String::new(),
        }
    }

    #[test]
    fn miss_then_hit() {
        let mut cache = TrackerCache::new(10);
        assert_eq!(cache.get(&TrackerId(1)), None);

        cache.insert(TrackerId(1), tracker(1));
        assert_eq!(cache.get(&TrackerId(1)), Some(tracker(1)));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_rate_percent, 50);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LruCache::new(3).with_eviction_batch(1);
        cache.insert(1u64, "a");
        cache.insert(2u64, "b");
        cache.insert(3u64, "c");

        let _ = cache.get(&1);
        let _ = cache.get(&2);
        cache.insert(4u64, "d");

        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(!cache.contains(&3));
        assert!(cache.contains(&4));
    }

    #[test]
    fn replacing_does_not_evict() {
        let mut cache = LruCache::new(2).with_eviction_batch(1);
        cache.insert(1u64, "a");
        cache.insert(2u64, "b");
        cache.insert(2u64, "c");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), Some("c"));
    }

    #[test]
    fn invalidate_removes_entry() {
        let mut cache = TrackerCache::new(10);
        cache.insert(TrackerId(5), tracker(5));

        assert_eq!(cache.invalidate(&TrackerId(5)), Some(tracker(5)));
        assert!(!cache.contains(&TrackerId(5)));
        assert_eq!(cache.invalidate(&TrackerId(5)), None);
    }

    #[test]
    fn update_patches_only_cached_entries() {
        let mut cache = TrackerCache::new(10);
        cache.insert(TrackerId(1), tracker(1));

        assert!(cache.update(&TrackerId(1), |t| t.count = 7));
        assert!(!cache.update(&TrackerId(2), |t| t.count = 7));
        assert!(!cache.contains(&TrackerId(2)));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
        assert_eq!(cache.get(&TrackerId(1)).map(|t| t.count), Some(7));
    }

    #[test]
    fn clear_keeps_counters() {
        let mut cache = TrackerCache::new(10);
        cache.insert(TrackerId(1), tracker(1));
        let _ = cache.get(&TrackerId(1));
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn zero_size_holds_one_entry() {
        let mut cache = LruCache::new(0);
        cache.insert(1u64, "a");
        cache.insert(2u64, "b");
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&2));
    }
}
