//! # layercache-redis
//!
//! Redis tier for layercache.
//!
//! [`RedisCache`] implements both tier contracts: the byte flavor
//! ([`layercache_core::ByteCache`]) with full [`layercache_core::EntryOptions`]
//! support, and the typed flavor ([`layercache_core::Cache`]) storing JSON.
//!
//! ```ignore
//! use layercache_redis::{RedisConfig, create_redis_cache};
//!
//! let config = RedisConfig { enabled: true, ..RedisConfig::default() };
//! let redis = create_redis_cache(&config).await?;
//! ```

mod cache;
mod config;
mod error;

pub use cache::RedisCache;
pub use config::RedisConfig;

use layercache_core::CacheResult;

/// Build a redis tier from `config` and verify the server answers.
///
/// # Errors
///
/// Returns `CacheError::Configuration` for a malformed configuration and
/// `CacheError::Connection` when the server cannot be reached.
pub async fn create_redis_cache(config: &RedisConfig) -> CacheResult<RedisCache> {
    tracing::info!(url = %config.url, "Connecting to Redis");

    let cache = RedisCache::new(config)?;
    cache.ping().await?;

    tracing::info!(key_prefix = %config.key_prefix, "Connected to Redis");
    Ok(cache)
}
