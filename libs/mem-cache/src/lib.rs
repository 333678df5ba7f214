//! In-process key/value cache with per-entry TTL
//!
//! Serves as the L1 store behind the feed repositories:
//! - Per-entry absolute expiry with a configurable default TTL
//! - Get-or-compute without holding the lock across the factory
//! - Expired entries are dropped lazily on read or via an explicit sweep

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(deadline) => Instant::now() > deadline,
            None => false,
        }
    }
}

/// Thread-safe in-memory cache with TTL support.
///
/// All reads and mutations go through a single mutex, so operations are
/// linearizable. Values are cloned out on read.
pub struct MemCache<V> {
    store: Mutex<HashMap<String, Entry<V>>>,
    default_ttl: Option<Duration>,
}

impl<V: Clone> MemCache<V> {
    /// `default_ttl` applies to entries stored without an explicit TTL.
    /// `None` means such entries never expire.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Returns the value iff the entry exists and has not expired.
    /// An expired entry is removed on the spot.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut store = self.store.lock();
        match store.get(key) {
            Some(entry) if entry.is_expired() => {
                store.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Stores a value. A `ttl` of `None` falls back to the default TTL;
    /// if that is also `None` the entry never expires.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.or(self.default_ttl).map(|ttl| Instant::now() + ttl);
        self.store
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    /// Removes a key, returning whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.store.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }

    /// Returns the cached value, or computes and stores one.
    ///
    /// The factory runs outside the lock; two concurrent callers may both
    /// compute, in which case the last writer wins.
    pub fn get_or_set<F>(&self, key: &str, factory: F, ttl: Option<Duration>) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = factory();
        self.set(key, value.clone(), ttl);
        value
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn size(&self) -> usize {
        self.store.lock().len()
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let mut store = self.store.lock();
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired());
        before - store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn get_set_roundtrip() {
        let cache: MemCache<String> = MemCache::new(None);
        cache.set("key", "value".to_string(), None);
        assert_eq!(cache.get("key"), Some("value".to_string()));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn default_ttl_expires_and_evicts() {
        let cache: MemCache<&str> = MemCache::new(Some(Duration::from_millis(50)));
        cache.set("key", "value", None);
        assert_eq!(cache.get("key"), Some("value"));

        sleep(Duration::from_millis(80));
        assert_eq!(cache.get("key"), None);
        // The expired read removed the entry.
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn explicit_ttl_overrides_default() {
        let cache: MemCache<&str> = MemCache::new(None);
        cache.set("short", "val", Some(Duration::from_millis(50)));
        cache.set("long", "val", Some(Duration::from_secs(10)));

        sleep(Duration::from_millis(80));
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some("val"));
    }

    #[test]
    fn delete_and_clear() {
        let cache: MemCache<&str> = MemCache::new(None);
        cache.set("k1", "v1", None);
        cache.set("k2", "v2", None);

        assert!(cache.delete("k1"));
        assert_eq!(cache.get("k1"), None);
        assert!(!cache.delete("missing"));

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.get("k2"), None);
    }

    #[test]
    fn get_or_set_runs_factory_once() {
        let cache: MemCache<String> = MemCache::new(None);
        let mut calls = 0;

        let value = cache.get_or_set(
            "key",
            || {
                calls += 1;
                "computed".to_string()
            },
            None,
        );
        assert_eq!(value, "computed");
        assert_eq!(calls, 1);

        let value = cache.get_or_set(
            "key",
            || {
                calls += 1;
                "recomputed".to_string()
            },
            None,
        );
        assert_eq!(value, "computed");
        assert_eq!(calls, 1);
    }

    #[test]
    fn cleanup_removes_only_expired() {
        let cache: MemCache<&str> = MemCache::new(None);
        cache.set("k1", "v1", Some(Duration::from_millis(10)));
        cache.set("k2", "v2", Some(Duration::from_secs(10)));

        sleep(Duration::from_millis(40));
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k2"), Some("v2"));
    }
}
