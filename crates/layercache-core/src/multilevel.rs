//! Multilevel cache over typed tiers.

use std::sync::Arc;
use std::time::Duration;

use crate::CacheResult;
use crate::cascade::{self, TypedLevel};
use crate::error::CacheError;
use crate::traits::{Cache, Factory};
use crate::types::validate_key;

/// Shared handle to a typed tier.
pub type DynCache<V> = Arc<dyn Cache<V>>;

/// A cache composed of an ordered list of typed tiers.
///
/// Tier 0 is consulted first and is presumed fastest and shortest-lived.
/// The list is fixed at construction; the tiers themselves are shared
/// handles and may be used by other caches at the same time.
///
/// ## Operations
///
/// | Operation | Tiers visited | Writes |
/// |-----------|---------------|--------|
/// | `get_or_add_multi` | 0..=hit | tiers before the hit (all on a full miss) |
/// | `try_get` | 0..=hit | none |
/// | `set` | all | all |
/// | `remove` | all | all |
///
/// `MultilevelCache` itself implements [`Cache`], so it can be nested as a
/// tier of another multilevel cache.
pub struct MultilevelCache<V> {
    caches: Vec<DynCache<V>>,
}

impl<V> std::fmt::Debug for MultilevelCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultilevelCache")
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

impl<V: Clone> MultilevelCache<V> {
    /// Create a multilevel cache over `caches`, fastest tier first.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` when `caches` is empty.
    pub fn new(caches: Vec<DynCache<V>>) -> CacheResult<Self> {
        if caches.is_empty() {
            return Err(CacheError::configuration(
                "a multilevel cache needs at least one tier",
            ));
        }
        tracing::info!(
            tiers = ?caches.iter().map(|c| c.backend_name()).collect::<Vec<_>>(),
            "multilevel cache created"
        );
        Ok(Self { caches })
    }

    /// The tiers, in probe order.
    pub fn caches(&self) -> &[DynCache<V>] {
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

    /// Read-through with one expiration per tier.
    ///
    /// Probes tiers in order and stops at the first hit. On a full miss the
    /// factory runs once. The resolved value is then written into every tier
    /// that missed, each with its own entry from `expirations`.
    ///
    /// # Errors
    ///
    /// - `CacheError::InvalidKey` for a blank key.
    /// - `CacheError::ExpirationMismatch` if `expirations.len() != self.len()`.
    /// - Any tier error, unchanged. Tiers after the failing one are not visited.
    pub fn get_or_add_multi<F>(
        &self,
        key: &str,
        factory: F,
        expirations: &[Duration],
    ) -> CacheResult<V>
    where
        F: FnOnce() -> V,
    {
        cascade::read_through(&self.levels(), key, expirations, || Ok(factory()))
    }

    fn levels(&self) -> Vec<TypedLevel<'_, V>> {
        self.caches.iter().map(TypedLevel).collect()
    }
}

impl<V: Clone + Send + Sync> Cache<V> for MultilevelCache<V> {
    /// Returns the first hit without backfilling earlier tiers.
    fn try_get(&self, key: &str) -> CacheResult<Option<V>> {
        validate_key(key)?;
        Ok(cascade::probe(&self.levels(), key)?.found)
    }

    /// Writes `value` into every tier with the same expiration.
    fn set(&self, key: &str, value: V, expiration: Duration) -> CacheResult<()> {
        validate_key(key)?;
        for cache in &self.caches {
            cache.set(key, value.clone(), expiration)?;
        }
        Ok(())
    }

    /// Removes `key` from every tier. A tier error aborts the remaining removals.
    fn remove(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        for cache in &self.caches {
            cache.remove(key)?;
        }
        tracing::debug!(key = %key, tiers = self.caches.len(), "removed from all tiers");
        Ok(())
    }

    /// Applies `expiration` to every tier and delegates to
    /// [`MultilevelCache::get_or_add_multi`].
    fn get_or_add_with(
        &self,
        key: &str,
        factory: Factory<'_, V>,
        expiration: Duration,
    ) -> CacheResult<V> {
        let expirations = vec![expiration; self.caches.len()];
        self.get_or_add_multi(key, factory, &expirations)
    }

    fn backend_name(&self) -> &'static str {
        "multilevel"
    }
}
