//! In-process tier holding byte payloads.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use layercache_core::{ByteCache, CacheError, CacheResult, EntryOptions, validate_key};
use time::OffsetDateTime;

use crate::stats::{CacheStats, Counters};

struct ByteEntry {
    data: Vec<u8>,
    /// Hard deadline from the absolute part of the options.
    deadline: Option<Instant>,
    sliding: Option<Duration>,
    expires_at: Option<Instant>,
}

impl ByteEntry {
    fn new(data: Vec<u8>, options: &EntryOptions) -> Self {
        let now = Instant::now();
        let wall = OffsetDateTime::now_utc();
        Self {
            data,
            deadline: options
                .absolute_ttl(wall)
                .and_then(|ttl| now.checked_add(ttl)),
            sliding: options.sliding_expiration,
            expires_at: options
                .initial_ttl(wall)
                .and_then(|ttl| now.checked_add(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Re-arms the sliding window, never past the hard deadline.
    fn touch(&mut self, now: Instant) {
        let Some(window) = self.sliding else {
            return;
        };
        let rearmed = now.checked_add(window);
        self.expires_at = match (rearmed, self.deadline) {
            (Some(rearmed), Some(deadline)) => Some(rearmed.min(deadline)),
            (None, deadline) => deadline,
            (rearmed, None) => rearmed,
        };
    }
}

/// In-process byte tier on a `DashMap`.
///
/// Honors every [`EntryOptions`] component: reads and `refresh` re-arm a
/// sliding window, capped by the absolute deadline. The async entry points
/// complete synchronously since nothing here blocks on I/O.
#[derive(Default)]
pub struct MemoryByteCache {
    entries: DashMap<String, ByteEntry>,
    counters: Counters,
}

impl MemoryByteCache {
    pub fn new() -> Self {
        Self::default()
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

    /// Runs `f` on a live entry. Expired entries are evicted instead.
    fn with_live<T>(&self, key: &str, f: impl FnOnce(&mut ByteEntry, Instant) -> T) -> Option<T> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) {
                return Some(f(&mut *entry, now));
            }
        }
        self.evict(key, now);
        None
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());

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

#[async_trait]
impl ByteCache for MemoryByteCache {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let found = self.with_live(key, |entry, now| {
            entry.touch(now);
            entry.data.clone()
        });
        match found {
            Some(_) => self.counters.hit(),
            None => self.counters.miss(),
        }
        Ok(found)
    }

    async fn get_async(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.get(key)
    }

    fn set(&self, key: &str, value: Option<&[u8]>, options: &EntryOptions) -> CacheResult<()> {
        validate_key(key)?;
        let value = value.ok_or(CacheError::null_value("value"))?;
        options.validate(OffsetDateTime::now_utc())?;

        self.entries
            .insert(key.to_string(), ByteEntry::new(value.to_vec(), options));
        Ok(())
    }

    async fn set_async(
        &self,
        key: &str,
        value: Option<&[u8]>,
        options: &EntryOptions,
    ) -> CacheResult<()> {
        self.set(key, value, options)
    }

    fn refresh(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        self.with_live(key, |entry, now| entry.touch(now));
        Ok(())
    }

    async fn refresh_async(&self, key: &str) -> CacheResult<()> {
        self.refresh(key)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }

    async fn remove_async(&self, key: &str) -> CacheResult<()> {
        self.remove(key)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
