use serde::{Deserialize, Serialize};

/// Redis tier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable the redis tier. When disabled, caches built from settings
    /// skip it.
    /// Default: false
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size for the async path
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connect, wait and I/O timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Prepended to every key, so several applications can share a database
    #[serde(default)]
    pub key_prefix: String,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            key_prefix: String::new(),
        }
    }
}

impl RedisConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.url.trim().is_empty() {
            return Err("redis.url must not be empty".into());
        }
        if self.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.timeout_ms == 0 {
            return Err("redis.timeout_ms must be > 0".into());
        }
        Ok(())
    }
}
