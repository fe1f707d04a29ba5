use std::time::Duration;

use layercache_core::EntryOptions;
use layercache_redis::RedisConfig;
use serde::{Deserialize, Serialize};

/// Settings for a multilevel cache built by [`crate::build_cache`] or
/// [`crate::build_byte_cache`].
///
/// ```toml
/// [[tiers]]
/// kind = "memory"
/// ttl_secs = 60
///
/// [[tiers]]
/// kind = "redis"
/// ttl_secs = 3600
/// sliding_secs = 600
///
/// [redis]
/// enabled = true
/// url = "redis://localhost:6379"
/// key_prefix = "myapp:"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Tiers, fastest first
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierSettings>,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_tiers() -> Vec<TierSettings> {
    vec![TierSettings::default()]
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            redis: RedisConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl CacheSettings {
    /// Parse settings from a TOML document and validate them.
    pub fn from_toml_str(s: &str) -> Result<Self, String> {
        let settings: Self = toml::from_str(s).map_err(|e| format!("settings parse error: {e}"))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tiers.is_empty() {
            return Err("tiers must list at least one tier".into());
        }
        for (index, tier) in self.tiers.iter().enumerate() {
            if tier.ttl_secs == 0 {
                return Err(format!("tiers[{index}].ttl_secs must be > 0"));
            }
            if tier.sliding_secs == Some(0) {
                return Err(format!("tiers[{index}].sliding_secs must be > 0"));
            }
        }
        self.redis.validate()?;
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    /// Per-tier expirations for the typed flavor, in tier order.
    pub fn expirations(&self) -> Vec<Duration> {
        self.tiers.iter().map(TierSettings::expiration).collect()
    }

    /// Per-tier options for the byte flavor, in tier order.
    pub fn entry_options(&self) -> Vec<EntryOptions> {
        self.tiers.iter().map(TierSettings::entry_options).collect()
    }
}

/// Kind of storage behind one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Memory,
    Redis,
    /// Stores nothing; every read-through runs its factory.
    None,
}

/// One tier of a configured cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSettings {
    pub kind: TierKind,
    /// Lifetime of entries written to this tier
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Idle window for the byte flavor; ignored by typed tiers
    #[serde(default)]
    pub sliding_secs: Option<u64>,
}

fn default_ttl_secs() -> u64 {
    300
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            kind: TierKind::Memory,
            ttl_secs: default_ttl_secs(),
            sliding_secs: None,
        }
    }
}

impl TierSettings {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn entry_options(&self) -> EntryOptions {
        let options = EntryOptions::relative(self.expiration());
        match self.sliding_secs {
            Some(secs) => options.with_sliding(Duration::from_secs(secs)),
            None => options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::CacheSettings;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default settings file, looked up in the working directory.
    pub const DEFAULT_PATH: &str = "layercache.toml";

    /// Load settings from an optional TOML file, then apply environment
    /// overrides such as `LAYERCACHE__REDIS__URL=redis://cache:6379`.
    pub fn load_settings(path: Option<&str>) -> Result<CacheSettings, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        builder = builder.add_source(
            Environment::with_prefix("LAYERCACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: CacheSettings = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = CacheSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.tiers.len(), 1);
        assert_eq!(settings.tiers[0].kind, TierKind::Memory);
        assert_eq!(settings.expirations(), vec![Duration::from_secs(300)]);
    }

    #[test]
    fn test_from_toml_str() {
        let settings = CacheSettings::from_toml_str(
            r#"
[[tiers]]
kind = "memory"
ttl_secs = 60

[[tiers]]
kind = "redis"
ttl_secs = 3600
sliding_secs = 600

[redis]
enabled = true
url = "redis://cache:6379"
key_prefix = "app:"
"#,
        )
        .unwrap();

        assert_eq!(settings.tiers[1].kind, TierKind::Redis);
        assert_eq!(settings.redis.key_prefix, "app:");
        assert_eq!(settings.redis.pool_size, 10);
        assert_eq!(
            settings.entry_options(),
            vec![
                EntryOptions::relative(Duration::from_secs(60)),
                EntryOptions::relative(Duration::from_secs(3600))
                    .with_sliding(Duration::from_secs(600)),
            ]
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut settings = CacheSettings {
            tiers: Vec::new(),
            ..CacheSettings::default()
        };
        assert!(settings.validate().unwrap_err().contains("at least one tier"));

        settings.tiers = vec![TierSettings {
            ttl_secs: 0,
            ..TierSettings::default()
        }];
        assert_eq!(
            settings.validate().unwrap_err(),
            "tiers[0].ttl_secs must be > 0"
        );

        settings.tiers = vec![TierSettings {
            sliding_secs: Some(0),
            ..TierSettings::default()
        }];
        assert!(settings.validate().unwrap_err().contains("sliding_secs"));

        settings.tiers = default_tiers();
        settings.logging.level = "loud".into();
        assert!(settings.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn test_unknown_tier_kind_is_rejected() {
        let err = CacheSettings::from_toml_str("[[tiers]]\nkind = \"disk\"\n").unwrap_err();
        assert!(err.contains("settings parse error"));
    }
}
