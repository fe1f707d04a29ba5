//! Tier contracts consumed by the multilevel orchestrators.
//!
//! Two flavors exist:
//!
//! - [`Cache<V>`]: tiers that hold native values of type `V`, each write
//!   carrying its own expiration.
//! - [`ByteCache`]: tiers that hold opaque byte payloads written with an
//!   [`EntryOptions`] policy, exposing both blocking and async entry points.

use std::time::Duration;

use async_trait::async_trait;

use crate::CacheResult;
use crate::types::{DEFAULT_EXPIRATION, EntryOptions};

/// Zero-argument value producer invoked on a full miss.
pub type Factory<'a, V> = Box<dyn FnOnce() -> V + 'a>;

/// A single typed storage tier.
///
/// A hit is reported as `Some(value)`. A cached value that happens to equal
/// `V::default()` is still a hit.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait Cache<V>: Send + Sync {
    /// Looks up `key` without side effects on other tiers.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidKey` for a blank key, or a backend error.
    fn try_get(&self, key: &str) -> CacheResult<Option<V>>;

    /// Stores `value` under `key`, replacing any prior entry.
    fn set(&self, key: &str, value: V, expiration: Duration) -> CacheResult<()>;

    /// Deletes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> CacheResult<()>;

    /// Returns the cached value for `key`, or stores and returns the
    /// factory's result when absent.
    ///
    /// Prefer [`CacheExt::get_or_add`], which accepts any closure.
    fn get_or_add_with(
        &self,
        key: &str,
        factory: Factory<'_, V>,
        expiration: Duration,
    ) -> CacheResult<V>;

    /// Returns the name of this tier for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Closure-friendly helpers over [`Cache`].
pub trait CacheExt<V>: Cache<V> {
    /// Read-through with an explicit expiration.
    fn get_or_add<F>(&self, key: &str, factory: F, expiration: Duration) -> CacheResult<V>
    where
        F: FnOnce() -> V,
    {
        self.get_or_add_with(key, Box::new(factory), expiration)
    }

    /// Read-through with [`DEFAULT_EXPIRATION`].
    fn get_or_add_default<F>(&self, key: &str, factory: F) -> CacheResult<V>
    where
        F: FnOnce() -> V,
    {
        self.get_or_add_with(key, Box::new(factory), DEFAULT_EXPIRATION)
    }
}

impl<V, C: Cache<V> + ?Sized> CacheExt<V> for C {}

/// A single byte-payload storage tier.
///
/// Every operation has a blocking and an async form with identical
/// semantics. Writes take `Option<&[u8]>` so that an absent payload can be
/// rejected with `CacheError::NullValue`; an empty slice is a legitimate
/// payload.
#[async_trait]
pub trait ByteCache: Send + Sync {
    /// Returns the payload stored under `key`, if any.
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Async form of [`ByteCache::get`].
    async fn get_async(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` with the given expiration policy.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NullValue` when `value` is `None`.
    fn set(&self, key: &str, value: Option<&[u8]>, options: &EntryOptions) -> CacheResult<()>;

    /// Async form of [`ByteCache::set`].
    async fn set_async(
        &self,
        key: &str,
        value: Option<&[u8]>,
        options: &EntryOptions,
    ) -> CacheResult<()>;

    /// Re-arms the sliding expiration of `key` without touching its value.
    fn refresh(&self, key: &str) -> CacheResult<()>;

    /// Async form of [`ByteCache::refresh`].
    async fn refresh_async(&self, key: &str) -> CacheResult<()>;

    /// Deletes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> CacheResult<()>;

    /// Async form of [`ByteCache::remove`].
    async fn remove_async(&self, key: &str) -> CacheResult<()>;

    /// Releases connections or other resources held by this tier.
    ///
    /// Default implementation is a no-op (for tiers holding nothing to release).
    fn close(&self) -> CacheResult<()> {
        Ok(())
    }

    /// Returns the name of this tier for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
