//! Recording tiers for orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::CacheResult;
use crate::error::CacheError;
use crate::traits::{ByteCache, Cache, Factory};
use crate::types::EntryOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Get,
    Set,
    Remove,
    Refresh,
}

/// Typed tier that records every call and can be told to fail once.
pub(crate) struct RecordingCache<V> {
    entries: Mutex<HashMap<String, (V, Duration)>>,
    calls: Mutex<Vec<Call>>,
    fail_next: AtomicBool,
}

impl<V: Clone> RecordingCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Stores a value without recording a call.
    pub fn seed(&self, key: &str, value: V) {
        self.entries
            .lock()
            .insert(key.to_string(), (value, Duration::MAX));
    }

    pub fn peek(&self, key: &str) -> Option<V> {
        self.entries.lock().get(key).map(|(v, _)| v.clone())
    }

    pub fn expiration_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: Call) -> CacheResult<()> {
        self.calls.lock().push(call);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CacheError::backend("recording", "injected failure"));
        }
        Ok(())
    }
}

impl<V: Clone + Send> Cache<V> for RecordingCache<V> {
    fn try_get(&self, key: &str) -> CacheResult<Option<V>> {
        self.record(Call::Get)?;
        Ok(self.peek(key))
    }

    fn set(&self, key: &str, value: V, expiration: Duration) -> CacheResult<()> {
        self.record(Call::Set)?;
        self.entries
            .lock()
            .insert(key.to_string(), (value, expiration));
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.record(Call::Remove)?;
        self.entries.lock().remove(key);
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
        let value = factory();
        self.set(key, value.clone(), expiration)?;
        Ok(value)
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Byte tier that records every call, blocking and async alike.
pub(crate) struct RecordingByteCache {
    entries: Mutex<HashMap<String, (Vec<u8>, EntryOptions)>>,
    calls: Mutex<Vec<Call>>,
    fail_next: AtomicBool,
    refreshes: AtomicUsize,
    closable: bool,
    closed: AtomicBool,
}

impl RecordingByteCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
            refreshes: AtomicUsize::new(0),
            closable: false,
            closed: AtomicBool::new(false),
        }
    }

    /// A tier that owns a releasable resource.
    pub fn closable() -> Self {
        Self {
            closable: true,
            ..Self::new()
        }
    }

    pub fn seed(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_vec(), EntryOptions::new()));
    }

    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).map(|(v, _)| v.clone())
    }

    pub fn options_of(&self, key: &str) -> Option<EntryOptions> {
        self.entries.lock().get(key).map(|(_, o)| *o)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: Call) -> CacheResult<()> {
        self.calls.lock().push(call);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CacheError::backend("recording", "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ByteCache for RecordingByteCache {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.record(Call::Get)?;
        Ok(self.peek(key))
    }

    async fn get_async(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        tokio::task::yield_now().await;
        self.get(key)
    }

    fn set(&self, key: &str, value: Option<&[u8]>, options: &EntryOptions) -> CacheResult<()> {
        let value = value.ok_or(CacheError::null_value("value"))?;
        self.record(Call::Set)?;
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_vec(), *options));
        Ok(())
    }

    async fn set_async(
        &self,
        key: &str,
        value: Option<&[u8]>,
        options: &EntryOptions,
    ) -> CacheResult<()> {
        tokio::task::yield_now().await;
        self.set(key, value, options)
    }

    fn refresh(&self, _key: &str) -> CacheResult<()> {
        self.record(Call::Refresh)?;
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh_async(&self, key: &str) -> CacheResult<()> {
        tokio::task::yield_now().await;
        self.refresh(key)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.record(Call::Remove)?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn remove_async(&self, key: &str) -> CacheResult<()> {
        tokio::task::yield_now().await;
        self.remove(key)
    }

    fn close(&self) -> CacheResult<()> {
        if self.closable {
            self.closed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}
