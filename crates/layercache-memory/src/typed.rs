//! In-process tier holding native values.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use layercache_core::{Cache, CacheResult, Factory, validate_key};
use parking_lot::Mutex;

use crate::stats::{CacheStats, Counters};

/// Cached value with its deadline. `None` means it never expires.
struct CachedEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CachedEntry<V> {
    fn new(value: V, expiration: Duration) -> Self {
        Self {
            value,
            // Overflow means "later than anything we can represent".
            expires_at: Instant::now().checked_add(expiration),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process typed tier on a `DashMap`.
///
/// Each entry carries its own expiration. Expired entries are dropped
/// lazily on access, or in bulk by [`MemoryCache::cleanup_expired`].
///
/// `get_or_add` serializes fills on a per-instance lock: check, lock,
/// re-check, compute, store. When several callers race on one key, the
/// factory runs once and every caller observes the stored value. The
/// factory runs while the lock is held, so it must not call back into the
/// same instance.
pub struct MemoryCache<V> {
    entries: DashMap<String, CachedEntry<V>>,
    fill_lock: Mutex<()>,
    counters: Counters,
}

impl<V: Clone> MemoryCache<V> {
    /// Create an empty cache.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use layercache_core::Cache;
    /// use layercache_memory::MemoryCache;
    ///
    /// let cache = MemoryCache::new();
    /// cache.set("greeting", "hello".to_string(), Duration::from_secs(60)).unwrap();
    /// assert_eq!(cache.try_get("greeting").unwrap(), Some("hello".to_string()));
    /// ```
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            fill_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Returns a live value without touching the statistics.
    fn lookup(&self, key: &str, now: Instant) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Drops `key` if it is still expired at `now`.
    fn evict(&self, key: &str, now: Instant) {
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.counters.evicted(1);
        }
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        self.counters.evicted(removed);
        if removed > 0 {
            tracing::debug!(removed, "expired memory entries cleaned up");
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }
}

impl<V: Clone> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Cache<V> for MemoryCache<V> {
    fn try_get(&self, key: &str) -> CacheResult<Option<V>> {
        validate_key(key)?;
        let now = Instant::now();

        if let Some(value) = self.lookup(key, now) {
            self.counters.hit();
            return Ok(Some(value));
        }

        self.evict(key, now);
        self.counters.miss();
        Ok(None)
    }

    fn set(&self, key: &str, value: V, expiration: Duration) -> CacheResult<()> {
        validate_key(key)?;
        self.entries
            .insert(key.to_string(), CachedEntry::new(value, expiration));
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }

    fn get_or_add_with(
        &self,
        key: &str,
        factory: Factory<'_, V>,
        expiration: Duration,
    ) -> CacheResult<V> {
        if let Some(value) = self.try_get(key)? {
            return Ok(value);
        }

        let _guard = self.fill_lock.lock();
        if let Some(value) = self.lookup(key, Instant::now()) {
            return Ok(value);
        }

        let value = factory();
        self.entries.insert(
            key.to_string(),
            CachedEntry::new(value.clone(), expiration),
        );
        Ok(value)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
