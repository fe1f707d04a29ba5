//! Multilevel cache over byte-payload tiers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::CacheResult;
use crate::cascade::{self, ByteLevel};
use crate::error::CacheError;
use crate::traits::ByteCache;
use crate::types::{EntryOptions, validate_key};

/// Shared handle to a byte tier.
pub type DynByteCache = Arc<dyn ByteCache>;

/// A byte cache composed of an ordered list of byte tiers.
///
/// Blocking and async entry points behave identically: tiers are visited
/// one at a time, lowest index first, and the async forms await each tier
/// before calling the next. Nothing is fanned out in parallel.
///
/// `get` returns the first hit and writes nothing. The `get_or_add*`
/// family additionally backfills the tiers that missed.
pub struct MultilevelByteCache {
    caches: Vec<DynByteCache>,
}

impl std::fmt::Debug for MultilevelByteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultilevelByteCache")
            .field(
                "tiers",
                &self
                    .caches
                    .iter()
                    .map(|c| c.backend_name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MultilevelByteCache {
    /// Create a multilevel byte cache over `caches`, fastest tier first.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` when `caches` is empty.
    pub fn new(caches: Vec<DynByteCache>) -> CacheResult<Self> {
        if caches.is_empty() {
            return Err(CacheError::configuration(
                "a multilevel cache needs at least one tier",
            ));
        }
        tracing::info!(
            tiers = ?caches.iter().map(|c| c.backend_name()).collect::<Vec<_>>(),
            "multilevel byte cache created"
        );
        Ok(Self { caches })
    }

    /// The tiers, in probe order.
    pub fn caches(&self) -> &[DynByteCache] {
        &self.caches
    }

    /// Number of tiers.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Always `false`; construction rejects an empty tier list.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Read-through with one option set per tier.
    ///
    /// # Errors
    ///
    /// - `CacheError::InvalidKey` for a blank key.
    /// - `CacheError::ExpirationMismatch` if `options.len() != self.len()`.
    /// - Any tier error, unchanged.
    pub fn get_or_add<F>(
        &self,
        key: &str,
        factory: F,
        options: &[EntryOptions],
    ) -> CacheResult<Vec<u8>>
    where
        F: FnOnce() -> Vec<u8>,
    {
        self.get_or_try_add(key, || Ok(factory()), options)
    }

    /// Like [`MultilevelByteCache::get_or_add`] with a fallible factory.
    ///
    /// A factory error is returned as-is and nothing is written.
    pub fn get_or_try_add<F>(
        &self,
        key: &str,
        factory: F,
        options: &[EntryOptions],
    ) -> CacheResult<Vec<u8>>
    where
        F: FnOnce() -> CacheResult<Vec<u8>>,
    {
        let levels: Vec<_> = self.caches.iter().map(ByteLevel).collect();
        cascade::read_through(&levels, key, options, factory)
    }

    /// Async form of [`MultilevelByteCache::get_or_add`].
    pub async fn get_or_add_async<F>(
        &self,
        key: &str,
        factory: F,
        options: &[EntryOptions],
    ) -> CacheResult<Vec<u8>>
    where
        F: FnOnce() -> Vec<u8>,
    {
        self.get_or_try_add_async(key, || Ok(factory()), options)
            .await
    }

    /// Async form of [`MultilevelByteCache::get_or_try_add`].
    pub async fn get_or_try_add_async<F>(
        &self,
        key: &str,
        factory: F,
        options: &[EntryOptions],
    ) -> CacheResult<Vec<u8>>
    where
        F: FnOnce() -> CacheResult<Vec<u8>>,
    {
        cascade::read_through_async(&self.caches, key, options, factory).await
    }
}

#[async_trait]
impl ByteCache for MultilevelByteCache {
    /// Returns the first hit. Earlier tiers are not backfilled.
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let levels: Vec<_> = self.caches.iter().map(ByteLevel).collect();
        Ok(cascade::probe(&levels, key)?.found)
    }

    async fn get_async(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(cascade::probe_async(&self.caches, key).await?.found)
    }

    /// Writes `value` into every tier with the same options.
    fn set(&self, key: &str, value: Option<&[u8]>, options: &EntryOptions) -> CacheResult<()> {
        validate_key(key)?;
        let value = value.ok_or(CacheError::null_value("value"))?;
        for cache in &self.caches {
            cache.set(key, Some(value), options)?;
        }
        Ok(())
    }

    async fn set_async(
        &self,
        key: &str,
        value: Option<&[u8]>,
        options: &EntryOptions,
    ) -> CacheResult<()> {
        validate_key(key)?;
        let value = value.ok_or(CacheError::null_value("value"))?;
        for cache in &self.caches {
            cache.set_async(key, Some(value), options).await?;
        }
        Ok(())
    }

    /// Refreshes every tier, whether or not it holds the key.
    fn refresh(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        for cache in &self.caches {
            cache.refresh(key)?;
        }
        Ok(())
    }

    async fn refresh_async(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        for cache in &self.caches {
            cache.refresh_async(key).await?;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        for cache in &self.caches {
            cache.remove(key)?;
        }
        tracing::debug!(key = %key, tiers = self.caches.len(), "removed from all tiers");
        Ok(())
    }

    async fn remove_async(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        for cache in &self.caches {
            cache.remove_async(key).await?;
        }
        tracing::debug!(key = %key, tiers = self.caches.len(), "removed from all tiers");
        Ok(())
    }

    /// Closes every tier in order. Tiers with nothing to release are no-ops.
    ///
    /// Tiers are shared handles: closing here closes them for every other
    /// cache built on the same tier.
    fn close(&self) -> CacheResult<()> {
        for cache in &self.caches {
            cache.close()?;
        }
        tracing::info!(tiers = self.caches.len(), "multilevel byte cache closed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "multilevel"
    }
}
