//! Mapping of redis and pool failures onto [`CacheError`].

use deadpool_redis::PoolError;
use layercache_core::CacheError;
use redis::RedisError;

pub(crate) const TIER: &str = "redis";

/// Unreachable server, dropped socket or timeout become `Connection`;
/// everything the server itself rejected becomes `Backend`.
pub(crate) fn map_redis_error(err: RedisError) -> CacheError {
    if is_connection_failure(&err) {
        CacheError::connection(err.to_string())
    } else {
        CacheError::backend(TIER, err.to_string())
    }
}

pub(crate) fn map_pool_error(err: PoolError) -> CacheError {
    match err {
        PoolError::Backend(err) => map_redis_error(err),
        other => CacheError::connection(other.to_string()),
    }
}

/// Whether a blocking connection must be reopened after `err`.
pub(crate) fn is_connection_failure(err: &RedisError) -> bool {
    err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_io_error()
        || err.is_timeout()
}
