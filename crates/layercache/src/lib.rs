//! # layercache
//!
//! Multilevel read-through caching.
//!
//! A cache is an ordered list of tiers, fastest first: typically an
//! in-process map in front of redis. A read-through probes the tiers in
//! order, runs the factory only when every tier misses, and backfills the
//! tiers that missed.
//!
//! ## Architecture
//!
//! - **layercache-core**: tier contracts, the cascade, multilevel caches
//! - **layercache-memory**: in-process tiers (`DashMap`)
//! - **layercache-redis**: redis tier (blocking connection plus async pool)
//! - **layercache** (this crate): settings, construction from settings,
//!   tracing setup, the stopwatch profiler
//!
//! ## Example
//!
//! ```ignore
//! use layercache::{build_cache, config::loader};
//!
//! let settings = loader::load_settings(None)?;
//! layercache::observability::init_tracing_from_settings(&settings.logging)?;
//!
//! let users = build_cache::<User>(&settings).await?;
//! let user = users.get_or_add("user:42", || load_user(42))?;
//! ```

pub mod config;
mod factory;
pub mod observability;
mod profiler;

pub use config::{CacheSettings, LoggingSettings, TierKind, TierSettings};
pub use factory::{ConfiguredByteCache, ConfiguredCache, build_byte_cache, build_cache};
pub use profiler::{Profiler, Stopwatch};

pub use layercache_core::prelude::*;
pub use layercache_core::Factory;
pub use layercache_memory::{CacheStats, MemoryByteCache, MemoryCache};
pub use layercache_redis::{RedisCache, RedisConfig, create_redis_cache};
