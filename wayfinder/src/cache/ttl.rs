//! TTL cache with oldest-insertion eviction.
//!
//! Entries expire lazily: `get` checks the age of the entry and deletes it if
//! its TTL has elapsed. There is no background sweeper.
//!
//! When a new key arrives at a full cache, the entry inserted longest ago is
//! evicted. Reads do not refresh an entry; overwriting a key does (it is
//! treated as a fresh insertion).
//!
//! Insertion order is kept in a queue of `(sequence, key)` records. Overwrites
//! and deletions leave stale records behind, which are skipped during eviction
//! and compacted once they outnumber live entries, so every operation is
//! amortized O(1).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{CacheConfig, CacheStats};

/// Slack before stale order records are compacted.
const ORDER_COMPACTION_SLACK: usize = 16;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    sequence: u64,
}

#[derive(Debug)]
struct TtlCacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    order: VecDeque<(u64, String)>,
    next_sequence: u64,
}

impl<V> TtlCacheInner<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            next_sequence: 0,
        }
    }

    fn is_live_record(&self, sequence: u64, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.sequence == sequence)
    }

    /// Remove the entry inserted longest ago, returning its key.
    fn evict_oldest(&mut self) -> Option<String> {
        while let Some((sequence, key)) = self.order.pop_front() {
            if self.is_live_record(sequence, &key) {
                self.entries.remove(&key);
                return Some(key);
            }
        }
        None
    }

    fn compact_order(&mut self) {
        if self.order.len() <= self.entries.len() * 2 + ORDER_COMPACTION_SLACK {
            return;
        }
        let entries = &self.entries;
        self.order.retain(|(sequence, key)| {
            entries
                .get(key)
                .is_some_and(|entry| entry.sequence == *sequence)
        });
    }
}

/// Bounded key/value store with per-entry expiry.
///
/// Safe to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wayfinder::cache::TtlCache;
///
/// let cache = TtlCache::new(2, Duration::from_secs(60));
/// cache.set("a", 1);
/// cache.set("b", 2);
/// cache.set("c", 3); // evicts "a", the oldest insertion
///
/// assert_eq!(cache.get("a"), None);
/// assert_eq!(cache.get("c"), Some(3));
/// ```
#[derive(Debug)]
pub struct TtlCache<V> {
    max_size: usize,
    ttl: Duration,
    inner: Mutex<TtlCacheInner<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache holding at most `max_size` entries for `ttl` each.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            ttl,
            inner: Mutex::new(TtlCacheInner::new(max_size)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Create a cache from a [`CacheConfig`].
    pub fn with_config(config: CacheConfig) -> Self {
        Self::new(config.max_size, config.ttl)
    }

    /// Insert or overwrite `key`.
    ///
    /// Inserting a new key into a full cache evicts the oldest insertion first.
    /// Overwriting restarts the entry's TTL and moves it to the back of the
    /// eviction order.
    pub fn set(&self, key: &str, value: V) {
        if self.max_size == 0 {
            return;
        }

        let now = Instant::now();
        let mut inner = self.inner.lock();

        if !inner.entries.contains_key(key) && inner.entries.len() >= self.max_size {
            if let Some(evicted) = inner.evict_oldest() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %evicted, max_size = self.max_size, "Evicted oldest cache entry");
            }
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: now,
                sequence,
            },
        );
        inner.order.push_back((sequence, key.to_string()));
        inner.compact_order();
    }

    /// Look up a live entry.
    ///
    /// Returns `None` when the key is absent or its TTL has elapsed; an expired
    /// entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => now.duration_since(entry.inserted_at) > self.ttl,
        };

        if expired {
            inner.entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Cache entry expired");
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Remove `key`. Returns true if an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(key).is_some();
        inner.compact_order();
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Check whether a live entry exists without counting a hit or miss.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| now.duration_since(entry.inserted_at) <= self.ttl)
    }

    /// Number of entries physically held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured entry limit.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Snapshot of usage counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entry_count: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TTL: Duration = Duration::from_secs(300);

    #[test]
    fn test_set_and_get() {
        let cache = TtlCache::new(10, TTL);
        cache.set("geocode:Paris", "48.85,2.35".to_string());

        assert_eq!(cache.get("geocode:Paris"), Some("48.85,2.35".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let cache: TtlCache<u32> = TtlCache::new(10, TTL);
        assert_eq!(cache.get("nope"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let cache = TtlCache::new(10, TTL);
        cache.set("k", 1);
        cache.set("k", 2);

        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_insertion() {
        let cache = TtlCache::new(3, TTL);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        // Reading "a" does not protect it; eviction is by insertion, not access
        assert_eq!(cache.get("a"), Some(1));

        cache.set("d", 4);
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("d"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_counts_as_fresh_insertion() {
        let cache = TtlCache::new(3, TTL);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        cache.set("a", 10);

        cache.set("d", 4);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"), "b is now the oldest insertion");
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let cache = TtlCache::new(2, TTL);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("b", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = TtlCache::new(10, TTL);
        cache.set("a", 1);
        cache.set("b", 2);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert!(!cache.delete("never-set"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_deleted_key_is_not_evicted_again() {
        let cache = TtlCache::new(2, TTL);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.delete("a");
        cache.set("c", 3);

        // Room was freed by delete, nothing evicted
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = TtlCache::new(0, TTL);
        cache.set("a", 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_order_queue_is_compacted() {
        let cache = TtlCache::new(4, TTL);
        for i in 0..1000 {
            cache.set("hot", i);
        }
        let order_len = cache.inner.lock().order.len();
        assert!(order_len <= 2 + ORDER_COMPACTION_SLACK, "got {}", order_len);
        assert_eq!(cache.get("hot"), Some(999));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_live_just_before_ttl() {
        let cache = TtlCache::new(10, TTL);
        cache.set("k", "v");

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        assert_eq!(cache.get("k"), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TtlCache::new(10, TTL);
        cache.set("k", "v");

        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        assert!(!cache.contains("k"));
        assert_eq!(cache.len(), 1, "expired entry is swept lazily");

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);

        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_restarts_ttl() {
        let cache = TtlCache::new(10, TTL);
        cache.set("k", 1);

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        cache.set("k", 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_stats_hits() {
        let cache = TtlCache::new(10, TTL);
        cache.set("k", 1);
        cache.get("k");
        cache.get("k");
        cache.get("other");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    proptest! {
        #[test]
        fn prop_size_bounded_and_oldest_evicted(
            max_size in 1usize..8,
            keys in proptest::collection::vec(0u8..12, 1..64),
        ) {
            let cache = TtlCache::new(max_size, TTL);
            // Model: keys in insertion order, oldest first
            let mut model: Vec<String> = Vec::new();

            for k in keys {
                let key = format!("k{}", k);
                let expected_victim = if !model.contains(&key) && model.len() == max_size {
                    Some(model[0].clone())
                } else {
                    None
                };

                cache.set(&key, k);
                model.retain(|existing| existing != &key);
                model.push(key.clone());
                if let Some(victim) = &expected_victim {
                    model.retain(|existing| existing != victim);
                    prop_assert!(!cache.contains(victim));
                }

                prop_assert!(cache.len() <= max_size);
                prop_assert_eq!(cache.len(), model.len());
                for live in &model {
                    prop_assert!(cache.contains(live));
                }
            }
        }
    }
}
