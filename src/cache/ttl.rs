//! Bounded LRU cache with a fixed per-entry time-to-live.

use std::{
    borrow::Borrow,
    hash::Hash,
    num::NonZeroUsize,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::ttl";

const METRIC_HIT: &str = "rfid_cache_hit_total";
const METRIC_MISS: &str = "rfid_cache_miss_total";
const METRIC_EXPIRED: &str = "rfid_cache_expired_total";
const METRIC_EVICT: &str = "rfid_cache_evict_total";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache `{name}` must hold at least one entry")]
    ZeroCapacity { name: &'static str },
    #[error("cache `{name}` requires a positive time-to-live")]
    ZeroTtl { name: &'static str },
    #[error("cache `{name}` time-to-live of {ttl_secs}s cannot be represented")]
    TtlOutOfRange { name: &'static str, ttl_secs: u64 },
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe LRU cache whose entries expire `ttl` after their last write.
///
/// Resident entries never exceed `capacity`. Expired entries are reclaimed
/// lazily by [`get`](Self::get) or in bulk by
/// [`purge_expired`](Self::purge_expired); until then they still occupy a
/// slot and are eligible for LRU eviction like any other entry.
pub struct TtlCache<K, V> {
    name: &'static str,
    capacity: NonZeroUsize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<LruCache<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Build a cache labelled `name` in logs and metrics.
    pub fn new(name: &'static str, capacity: usize, ttl: Duration) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CacheError::ZeroCapacity { name })?;
        if ttl.is_zero() {
            return Err(CacheError::ZeroTtl { name });
        }
        if Instant::now().checked_add(ttl).is_none() {
            return Err(CacheError::TtlOutOfRange {
                name,
                ttl_secs: ttl.as_secs(),
            });
        }

        Ok(Self {
            name,
            capacity,
            ttl,
            clock: Arc::new(SystemClock),
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a clone of the live value for `key`, marking it most recently used.
    ///
    /// An entry whose expiry instant has been reached is removed and reported
    /// as a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let now = self.clock.now();

        let expired = match entries.peek(key) {
            Some(entry) => now >= entry.expires_at,
            None => {
                counter!(METRIC_MISS, "cache" => self.name).increment(1);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            counter!(METRIC_EXPIRED, "cache" => self.name).increment(1);
            counter!(METRIC_MISS, "cache" => self.name).increment(1);
            debug!(cache = self.name, op = "get", "dropped expired entry");
            return None;
        }

        counter!(METRIC_HIT, "cache" => self.name).increment(1);
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or refresh `key`.
    ///
    /// Refreshing replaces the value, restarts the time-to-live and moves the
    /// entry to the most-recent position. Inserting into a full cache evicts
    /// exactly one least-recently-used entry.
    pub fn set(&self, key: K, value: V) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "set");
        let Some(expires_at) = self.clock.now().checked_add(self.ttl) else {
            warn!(cache = self.name, op = "set", "expiry overflows the clock, entry not stored");
            return;
        };

        let evicts = !entries.contains(&key) && entries.len() >= self.capacity.get();
        entries.put(key, Entry { value, expires_at });

        if evicts {
            counter!(METRIC_EVICT, "cache" => self.name).increment(1);
            debug!(cache = self.name, op = "set", "evicted least recently used entry");
        }
    }

    /// Remove `key` if present.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        mutex_lock(&self.entries, SOURCE, "delete").pop(key);
    }

    /// Number of resident entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Remove every expired entry and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "purge_expired");
        let now = self.clock.now();

        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        let removed = expired.len();
        if removed > 0 {
            counter!(METRIC_EXPIRED, "cache" => self.name).increment(removed as u64);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::cache::ManualClock;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache_with_clock(capacity: usize, ttl: Duration) -> (TtlCache<String, u32>, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::new("test", capacity, ttl)
            .expect("valid cache")
            .with_clock(Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = TtlCache::<String, u32>::new("info", 0, HOUR).err();
        assert_eq!(err, Some(CacheError::ZeroCapacity { name: "info" }));
    }

    #[test]
    fn rejects_zero_ttl() {
        let err = TtlCache::<String, u32>::new("info", 5, Duration::ZERO).err();
        assert_eq!(err, Some(CacheError::ZeroTtl { name: "info" }));
    }

    #[test]
    fn rejects_ttl_past_the_clock_range() {
        let err = TtlCache::<String, u32>::new("info", 5, Duration::MAX).err();
        assert!(matches!(
            err,
            Some(CacheError::TtlOutOfRange { name: "info", .. })
        ));

        let err = TtlCache::<String, u32>::new("info", 5, Duration::from_secs(u64::MAX)).err();
        assert!(matches!(err, Some(CacheError::TtlOutOfRange { .. })));
    }

    #[test]
    fn get_promotes_entry_so_the_other_is_evicted() {
        let (cache, _clock) = cache_with_clock(2, HOUR);
        cache.set("A".to_string(), 1);
        cache.set("B".to_string(), 2);

        assert_eq!(cache.get("A"), Some(1));
        cache.set("C".to_string(), 3);

        assert_eq!(cache.get("B"), None);
        assert_eq!(cache.get("A"), Some(1));
        assert_eq!(cache.get("C"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn entry_expires_exactly_at_ttl() {
        let (cache, clock) = cache_with_clock(5, HOUR);
        cache.set("A".to_string(), 1);

        clock.advance(HOUR - Duration::from_secs(1));
        assert_eq!(cache.get("A"), Some(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("A"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn refreshing_restarts_ttl_and_replaces_value() {
        let (cache, clock) = cache_with_clock(5, HOUR);
        cache.set("A".to_string(), 1);
        clock.advance(Duration::from_secs(1800));

        cache.set("A".to_string(), 2);
        clock.advance(Duration::from_secs(1800));

        assert_eq!(cache.get("A"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn refreshing_at_capacity_does_not_evict() {
        let (cache, _clock) = cache_with_clock(2, HOUR);
        cache.set("A".to_string(), 1);
        cache.set("B".to_string(), 2);

        cache.set("A".to_string(), 10);
        cache.set("C".to_string(), 3);

        assert_eq!(cache.get("A"), Some(10));
        assert_eq!(cache.get("B"), None);
        assert_eq!(cache.get("C"), Some(3));
    }

    #[test]
    fn delete_is_a_noop_for_missing_keys() {
        let (cache, _clock) = cache_with_clock(2, HOUR);
        cache.set("A".to_string(), 1);

        cache.delete("missing");
        assert_eq!(cache.len(), 1);

        cache.delete("A");
        cache.delete("A");
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_expired_reports_removed_count() {
        let (cache, clock) = cache_with_clock(5, Duration::from_secs(60));
        cache.set("A".to_string(), 1);
        cache.set("B".to_string(), 2);
        clock.advance(Duration::from_secs(30));
        cache.set("C".to_string(), 3);
        clock.advance(Duration::from_secs(30));

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("C"), Some(3));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn expired_entries_still_count_until_reclaimed() {
        let (cache, clock) = cache_with_clock(2, Duration::from_secs(60));
        cache.set("A".to_string(), 1);
        clock.advance(Duration::from_secs(60));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("A"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn concurrent_writers_never_exceed_capacity() {
        let cache = TtlCache::<String, usize>::new("concurrent", 4, HOUR).expect("valid cache");

        thread::scope(|scope| {
            for worker in 0..8 {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..200 {
                        let key = format!("{worker}-{}", i % 16);
                        cache.set(key.clone(), i);
                        let _ = cache.get(&key);
                        assert!(cache.len() <= 4);
                    }
                });
            }
        });

        assert_eq!(cache.len(), 4);
    }
}
