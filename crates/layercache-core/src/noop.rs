//! A tier that stores nothing.

use std::time::Duration;

use async_trait::async_trait;

use crate::CacheResult;
use crate::error::CacheError;
use crate::traits::{ByteCache, Cache, Factory};
use crate::types::{EntryOptions, validate_key};

/// Tier that always misses.
///
/// Useful as a placeholder when caching is switched off: every read-through
/// runs its factory and nothing is retained. Keys are still validated so
/// that callers see the same usage errors as with a real tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl<V> Cache<V> for NoCache {
    fn try_get(&self, key: &str) -> CacheResult<Option<V>> {
        validate_key(key)?;
        Ok(None)
    }

    fn set(&self, key: &str, _value: V, _expiration: Duration) -> CacheResult<()> {
        validate_key(key)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        validate_key(key)
    }

    fn get_or_add_with(
        &self,
        key: &str,
        factory: Factory<'_, V>,
        _expiration: Duration,
    ) -> CacheResult<V> {
        validate_key(key)?;
        Ok(factory())
    }

    fn backend_name(&self) -> &'static str {
        "none"
    }
}

#[async_trait]
impl ByteCache for NoCache {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(None)
    }

    async fn get_async(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        ByteCache::get(self, key)
    }

    fn set(&self, key: &str, value: Option<&[u8]>, _options: &EntryOptions) -> CacheResult<()> {
        validate_key(key)?;
        value.ok_or(CacheError::null_value("value"))?;
        Ok(())
    }

    async fn set_async(
        &self,
        key: &str,
        value: Option<&[u8]>,
        options: &EntryOptions,
    ) -> CacheResult<()> {
        ByteCache::set(self, key, value, options)
    }

    fn refresh(&self, key: &str) -> CacheResult<()> {
        validate_key(key)
    }

    async fn refresh_async(&self, key: &str) -> CacheResult<()> {
        validate_key(key)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        validate_key(key)
    }

    async fn remove_async(&self, key: &str) -> CacheResult<()> {
        validate_key(key)
    }

    fn backend_name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multilevel::{DynCache, MultilevelCache};
    use crate::CacheExt;
    use crate::distributed::{DynByteCache, MultilevelByteCache};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_factory_runs_on_every_call() {
        let cache =
            MultilevelCache::new(vec![Arc::new(NoCache) as DynCache<String>]).unwrap();
        let invocations = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_add_multi(
                    "k1",
                    || {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        "v1".to_string()
                    },
                    &[Duration::from_secs(1)],
                )
                .unwrap();
            assert_eq!(value, "v1");
        }

        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_still_validates_keys() {
        let err = Cache::<u8>::try_get(&NoCache, " ").unwrap_err();
        assert!(err.is_invalid_key());
        let err = NoCache.get_or_add_default("", || 1_u8).unwrap_err();
        assert!(err.is_invalid_key());
    }

    #[tokio::test]
    async fn test_byte_flavor_never_retains() {
        let cache = MultilevelByteCache::new(vec![Arc::new(NoCache) as DynByteCache]).unwrap();
        cache
            .set_async("k", Some(b"v".as_slice()), &EntryOptions::new())
            .await
            .unwrap();
        assert_eq!(cache.get_async("k").await.unwrap(), None);
        assert!(
            ByteCache::set(&NoCache, "k", None, &EntryOptions::new())
                .unwrap_err()
                .is_null_value()
        );
    }
}
