//! Redis tier for both cache flavors.
//!
//! ## Storage layout
//!
//! Byte entries are stored as a hash so the expiration policy travels with
//! the payload:
//!
//! | field | content |
//! |-------|---------|
//! | `data` | payload bytes (may be empty) |
//! | `absexp` | absolute deadline in unix milliseconds, `-1` if none |
//! | `sldexp` | sliding window in milliseconds, `-1` if none |
//!
//! The key's TTL (`PEXPIRE`) carries the current lifetime. Every read and
//! `refresh` re-arms the TTL to the sliding window, capped by `absexp`.
//!
//! Typed entries are plain strings holding JSON, written with `SET .. PX`.
//! A key must be used through one flavor only: reading a hash as a string,
//! or the reverse, fails with the server's `WRONGTYPE` error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use layercache_core::{
    ByteCache, Cache, CacheError, CacheResult, EntryOptions, Factory, JsonCodec, ValueCodec,
    validate_key,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

use crate::config::RedisConfig;
use crate::error::{TIER, is_connection_failure, map_pool_error, map_redis_error};

const DATA_FIELD: &str = "data";
const ABSOLUTE_FIELD: &str = "absexp";
const SLIDING_FIELD: &str = "sldexp";
const NOT_PRESENT: i64 = -1;

/// Longest TTL sent to the server. Redis rejects deadlines that overflow
/// when added to its clock, so stay well clear of `i64::MAX`.
const MAX_TTL_MS: u128 = (i64::MAX / 2) as u128;

/// Redis-backed cache tier.
///
/// The blocking entry points share one lazily opened connection, reopened
/// after a connection-level failure. The async entry points draw from a
/// `deadpool_redis` pool. Blocking calls issued from inside a tokio runtime
/// block that worker; prefer the async forms there.
pub struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<redis::Connection>>,
    pool: Pool,
    timeout: Duration,
    key_prefix: String,
    closed: AtomicBool,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("key_prefix", &self.key_prefix)
            .field("timeout", &self.timeout)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl RedisCache {
    /// Build a tier from `config` without connecting.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` for an unparsable URL or a pool
    /// that cannot be created.
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| CacheError::configuration(format!("invalid redis url: {e}")))?;

        let mut pool_config = deadpool_redis::Config::from_url(&config.url);
        if let Some(ref mut pool) = pool_config.pool {
            pool.max_size = config.pool_size;
            pool.timeouts.wait = Some(timeout);
            pool.timeouts.create = Some(timeout);
            pool.timeouts.recycle = Some(timeout);
        } else {
            let mut pool = deadpool_redis::PoolConfig::new(config.pool_size);
            pool.timeouts.wait = Some(timeout);
            pool.timeouts.create = Some(timeout);
            pool.timeouts.recycle = Some(timeout);
            pool_config.pool = Some(pool);
        }
        let pool = pool_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| CacheError::configuration(format!("failed to create redis pool: {e}")))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            pool,
            timeout,
            key_prefix: config.key_prefix.clone(),
            closed: AtomicBool::new(false),
        })
    }

    /// Round-trips a `PING` through the async pool.
    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.pooled().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::connection("redis tier has been closed"));
        }
        Ok(())
    }

    fn open_connection(&self) -> CacheResult<redis::Connection> {
        let conn = self
            .client
            .get_connection_with_timeout(self.timeout)
            .map_err(map_redis_error)?;
        conn.set_read_timeout(Some(self.timeout))
            .map_err(map_redis_error)?;
        conn.set_write_timeout(Some(self.timeout))
            .map_err(map_redis_error)?;
        tracing::debug!("opened blocking redis connection");
        Ok(conn)
    }

    /// Runs `op` on the shared blocking connection.
    fn blocking<T>(
        &self,
        op: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> CacheResult<T> {
        self.ensure_open()?;
        let mut slot = self.connection.lock();
        let conn = match &mut *slot {
            Some(conn) => conn,
            empty => empty.insert(self.open_connection()?),
        };

        op(conn).map_err(|err| {
            if is_connection_failure(&err) {
                *slot = None;
            }
            tracing::debug!(error = %err, "redis command failed");
            map_redis_error(err)
        })
    }

    async fn pooled(&self) -> CacheResult<deadpool_redis::Connection> {
        self.ensure_open()?;
        self.pool.get().await.map_err(map_pool_error)
    }
}

/// Expiration fields and initial TTL for a byte write made at `now`.
struct StoredPolicy {
    absolute_ms: i64,
    sliding_ms: i64,
    ttl_ms: Option<i64>,
}

impl StoredPolicy {
    fn new(options: &EntryOptions, now: OffsetDateTime) -> Self {
        let absolute_ms = options
            .absolute_ttl(now)
            .map(|ttl| unix_ms(now).saturating_add(clamp_ms(ttl)))
            .unwrap_or(NOT_PRESENT);
        let sliding_ms = options
            .sliding_expiration
            .map(clamp_ms)
            .unwrap_or(NOT_PRESENT);
        Self {
            absolute_ms,
            sliding_ms,
            ttl_ms: options.initial_ttl(now).map(clamp_ms),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> redis::Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("DEL")
            .arg(key)
            .ignore()
            .cmd("HSET")
            .arg(key)
            .arg(DATA_FIELD)
            .arg(value)
            .arg(ABSOLUTE_FIELD)
            .arg(self.absolute_ms)
            .arg(SLIDING_FIELD)
            .arg(self.sliding_ms)
            .ignore();
        if let Some(ttl) = self.ttl_ms {
            pipe.cmd("PEXPIRE").arg(key).arg(ttl).ignore();
        }
        pipe
    }
}

fn unix_ms(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Milliseconds in `ttl`, at least 1 and at most what redis accepts.
fn clamp_ms(ttl: Duration) -> i64 {
    let ms = ttl.as_millis().clamp(1, MAX_TTL_MS);
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// TTL a read or refresh at `now_ms` should re-arm, if the entry slides.
fn rearm_ttl(absolute_ms: i64, sliding_ms: i64, now_ms: i64) -> Option<i64> {
    if sliding_ms == NOT_PRESENT {
        return None;
    }
    if absolute_ms == NOT_PRESENT {
        return Some(sliding_ms);
    }
    let remaining = absolute_ms.saturating_sub(now_ms);
    // Past the deadline the server drops the key on its own.
    (remaining > 0).then(|| sliding_ms.min(remaining))
}

fn hmget(key: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("HMGET");
    cmd.arg(key)
        .arg(DATA_FIELD)
        .arg(ABSOLUTE_FIELD)
        .arg(SLIDING_FIELD);
    cmd
}

fn policy_fields(key: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("HMGET");
    cmd.arg(key).arg(ABSOLUTE_FIELD).arg(SLIDING_FIELD);
    cmd
}

fn pexpire(key: &str, ttl_ms: i64) -> redis::Cmd {
    let mut cmd = redis::cmd("PEXPIRE");
    cmd.arg(key).arg(ttl_ms);
    cmd
}

type HashEntry = (Option<Vec<u8>>, Option<i64>, Option<i64>);

fn sliding_rearm(absolute: Option<i64>, sliding: Option<i64>) -> Option<i64> {
    rearm_ttl(
        absolute.unwrap_or(NOT_PRESENT),
        sliding.unwrap_or(NOT_PRESENT),
        unix_ms(OffsetDateTime::now_utc()),
    )
}

fn prepare_set<'v>(
    key: &str,
    value: Option<&'v [u8]>,
    options: &EntryOptions,
) -> CacheResult<(&'v [u8], StoredPolicy)> {
    validate_key(key)?;
    let value = value.ok_or(CacheError::null_value("value"))?;
    let now = OffsetDateTime::now_utc();
    options.validate(now)?;
    Ok((value, StoredPolicy::new(options, now)))
}

#[async_trait]
impl ByteCache for RedisCache {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let key = self.physical_key(key);
        self.blocking(|conn| {
            let (data, absolute, sliding): HashEntry = hmget(&key).query(conn)?;
            if data.is_some() {
                if let Some(ttl) = sliding_rearm(absolute, sliding) {
                    let _: i64 = pexpire(&key, ttl).query(conn)?;
                }
            }
            Ok(data)
        })
    }

    async fn get_async(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let key = self.physical_key(key);
        let mut conn = self.pooled().await?;

        let (data, absolute, sliding): HashEntry = hmget(&key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        if data.is_some() {
            if let Some(ttl) = sliding_rearm(absolute, sliding) {
                let _: i64 = pexpire(&key, ttl)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis_error)?;
            }
        }
        Ok(data)
    }

    fn set(&self, key: &str, value: Option<&[u8]>, options: &EntryOptions) -> CacheResult<()> {
        let (value, policy) = prepare_set(key, value, options)?;
        let key = self.physical_key(key);
        self.blocking(|conn| {
            let _: () = policy.write(&key, value).query(conn)?;
            Ok(())
        })
    }

    async fn set_async(
        &self,
        key: &str,
        value: Option<&[u8]>,
        options: &EntryOptions,
    ) -> CacheResult<()> {
        let (value, policy) = prepare_set(key, value, options)?;
        let key = self.physical_key(key);
        let mut conn = self.pooled().await?;

        let _: () = policy
            .write(&key, value)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    fn refresh(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        let key = self.physical_key(key);
        self.blocking(|conn| {
            let (absolute, sliding): (Option<i64>, Option<i64>) =
                policy_fields(&key).query(conn)?;
            if let Some(ttl) = sliding_rearm(absolute, sliding) {
                let _: i64 = pexpire(&key, ttl).query(conn)?;
            }
            Ok(())
        })
    }

    async fn refresh_async(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        let key = self.physical_key(key);
        let mut conn = self.pooled().await?;

        let (absolute, sliding): (Option<i64>, Option<i64>) = policy_fields(&key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        if let Some(ttl) = sliding_rearm(absolute, sliding) {
            let _: i64 = pexpire(&key, ttl)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        let key = self.physical_key(key);
        self.blocking(|conn| {
            let _: i64 = redis::cmd("DEL").arg(&key).query(conn)?;
            Ok(())
        })
    }

    async fn remove_async(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        let key = self.physical_key(key);
        let mut conn = self.pooled().await?;

        let _: i64 = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    /// Drops the blocking connection and closes the pool. Later calls fail
    /// with `CacheError::Connection`.
    fn close(&self) -> CacheResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.connection.lock().take();
        self.pool.close();
        tracing::info!("redis tier closed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        TIER
    }
}

impl<V> Cache<V> for RedisCache
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn try_get(&self, key: &str) -> CacheResult<Option<V>> {
        validate_key(key)?;
        let key = self.physical_key(key);
        let bytes: Option<Vec<u8>> =
            self.blocking(|conn| redis::cmd("GET").arg(&key).query(conn))?;
        bytes.map(|bytes| JsonCodec.decode(&bytes)).transpose()
    }

    fn set(&self, key: &str, value: V, expiration: Duration) -> CacheResult<()> {
        validate_key(key)?;
        let bytes = JsonCodec.encode(&value)?;
        let key = self.physical_key(key);
        self.blocking(|conn| {
            let _: () = redis::cmd("SET")
                .arg(&key)
                .arg(bytes)
                .arg("PX")
                .arg(clamp_ms(expiration))
                .query(conn)?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        ByteCache::remove(self, key)
    }

    fn get_or_add_with(
        &self,
        key: &str,
        factory: Factory<'_, V>,
        expiration: Duration,
    ) -> CacheResult<V> {
        if let Some(value) = Cache::<V>::try_get(self, key)? {
            return Ok(value);
        }
        let value = factory();
        let bytes = JsonCodec.encode(&value)?;
        let key = self.physical_key(key);
        self.blocking(|conn| {
            let _: () = redis::cmd("SET")
                .arg(&key)
                .arg(bytes)
                .arg("PX")
                .arg(clamp_ms(expiration))
                .query(conn)?;
            Ok(())
        })?;
        Ok(value)
    }

    fn backend_name(&self) -> &'static str {
        TIER
    }
}
