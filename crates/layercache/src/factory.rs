//! Building multilevel caches from [`CacheSettings`].

use std::sync::Arc;
use std::time::Duration;

use layercache_core::{
    ByteCache, CacheError, CacheResult, DynByteCache, DynCache, EntryOptions, MultilevelByteCache,
    MultilevelCache, NoCache,
};
use layercache_memory::{MemoryByteCache, MemoryCache};
use layercache_redis::{RedisCache, create_redis_cache};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::{CacheSettings, TierKind, TierSettings};

/// A typed multilevel cache together with the per-tier expirations it was
/// configured with.
pub struct ConfiguredCache<V> {
    cache: MultilevelCache<V>,
    expirations: Vec<Duration>,
}

impl<V: Clone + Send + Sync> ConfiguredCache<V> {
    /// Read-through using the configured expiration of each tier.
    pub fn get_or_add<F>(&self, key: &str, factory: F) -> CacheResult<V>
    where
        F: FnOnce() -> V,
    {
        self.cache.get_or_add_multi(key, factory, &self.expirations)
    }

    pub fn cache(&self) -> &MultilevelCache<V> {
        &self.cache
    }

    pub fn expirations(&self) -> &[Duration] {
        &self.expirations
    }
}

/// A byte multilevel cache together with the per-tier options it was
/// configured with.
#[derive(Debug)]
pub struct ConfiguredByteCache {
    cache: Arc<MultilevelByteCache>,
    options: Vec<EntryOptions>,
}

impl ConfiguredByteCache {
    /// Read-through using the configured options of each tier.
    pub fn get_or_add<F>(&self, key: &str, factory: F) -> CacheResult<Vec<u8>>
    where
        F: FnOnce() -> Vec<u8>,
    {
        self.cache.get_or_add(key, factory, &self.options)
    }

    /// Async form of [`ConfiguredByteCache::get_or_add`].
    pub async fn get_or_add_async<F>(&self, key: &str, factory: F) -> CacheResult<Vec<u8>>
    where
        F: FnOnce() -> Vec<u8>,
    {
        self.cache
            .get_or_add_async(key, factory, &self.options)
            .await
    }

    pub fn cache(&self) -> &Arc<MultilevelByteCache> {
        &self.cache
    }

    pub fn options(&self) -> &[EntryOptions] {
        &self.options
    }

    /// Closes every tier. See [`ByteCache::close`].
    pub fn close(&self) -> CacheResult<()> {
        self.cache.close()
    }
}

/// A tier resolved from settings, before it is given a flavor.
enum Resolved<'a> {
    Memory(&'a TierSettings),
    Redis(&'a TierSettings, Arc<RedisCache>),
    None(&'a TierSettings),
}

impl Resolved<'_> {
    fn settings(&self) -> &TierSettings {
        match self {
            Resolved::Memory(tier) | Resolved::Redis(tier, _) | Resolved::None(tier) => tier,
        }
    }
}

/// Connects redis at most once and drops redis tiers it cannot use.
async fn resolve_tiers(settings: &CacheSettings) -> CacheResult<Vec<Resolved<'_>>> {
    settings.validate().map_err(CacheError::configuration)?;

    let mut redis: Option<Option<Arc<RedisCache>>> = None;
    let mut resolved = Vec::with_capacity(settings.tiers.len());

    for (index, tier) in settings.tiers.iter().enumerate() {
        match tier.kind {
            TierKind::Memory => resolved.push(Resolved::Memory(tier)),
            TierKind::None => resolved.push(Resolved::None(tier)),
            TierKind::Redis => {
                if redis.is_none() {
                    redis = Some(connect_redis(settings).await);
                }
                match redis.as_ref().and_then(Option::as_ref) {
                    Some(conn) => resolved.push(Resolved::Redis(tier, Arc::clone(conn))),
                    None => tracing::warn!(tier = index, "Skipping redis tier"),
                }
            }
        }
    }

    if resolved.is_empty() {
        tracing::warn!("No usable tier left. Falling back to local cache.");
        if let Some(first) = settings.tiers.first() {
            resolved.push(Resolved::Memory(first));
        }
    }
    Ok(resolved)
}

async fn connect_redis(settings: &CacheSettings) -> Option<Arc<RedisCache>> {
    if !settings.redis.enabled {
        tracing::warn!("Redis tier configured but redis is disabled");
        return None;
    }
    match create_redis_cache(&settings.redis).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to connect to Redis");
            None
        }
    }
}

/// Build a byte multilevel cache from `settings`.
///
/// Redis tiers are dropped with a warning when redis is disabled or cannot
/// be reached; this happens only here, never per operation.
///
/// # Errors
///
/// Returns `CacheError::Configuration` when the settings are invalid.
pub async fn build_byte_cache(settings: &CacheSettings) -> CacheResult<ConfiguredByteCache> {
    let resolved = resolve_tiers(settings).await?;

    let options = resolved
        .iter()
        .map(|tier| tier.settings().entry_options())
        .collect();
    let tiers = resolved
        .into_iter()
        .map(|tier| match tier {
            Resolved::Memory(_) => Arc::new(MemoryByteCache::new()) as DynByteCache,
            Resolved::Redis(_, redis) => redis as DynByteCache,
            Resolved::None(_) => Arc::new(NoCache) as DynByteCache,
        })
        .collect();

    Ok(ConfiguredByteCache {
        cache: Arc::new(MultilevelByteCache::new(tiers)?),
        options,
    })
}

/// Build a typed multilevel cache from `settings`.
///
/// Memory tiers hold `V` natively; redis tiers store it as JSON.
///
/// # Errors
///
/// Returns `CacheError::Configuration` when the settings are invalid.
pub async fn build_cache<V>(settings: &CacheSettings) -> CacheResult<ConfiguredCache<V>>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let resolved = resolve_tiers(settings).await?;

    let expirations = resolved
        .iter()
        .map(|tier| tier.settings().expiration())
        .collect();
    let tiers = resolved
        .into_iter()
        .map(|tier| match tier {
            Resolved::Memory(_) => Arc::new(MemoryCache::<V>::new()) as DynCache<V>,
            Resolved::Redis(_, redis) => redis as DynCache<V>,
            Resolved::None(_) => Arc::new(NoCache) as DynCache<V>,
        })
        .collect();

    Ok(ConfiguredCache {
        cache: MultilevelCache::new(tiers)?,
        expirations,
    })
}
