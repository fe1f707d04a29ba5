//! # layercache-memory
//!
//! In-process cache tiers backed by [`dashmap`].
//!
//! - [`MemoryCache<V>`]: typed tier storing native values, one expiration
//!   per entry.
//! - [`MemoryByteCache`]: byte tier honoring absolute, relative and sliding
//!   [`layercache_core::EntryOptions`].
//!
//! Both track hits, misses and evictions, and drop expired entries lazily on
//! access or in bulk via `cleanup_expired`.

mod bytes;
mod stats;
mod typed;

pub use bytes::MemoryByteCache;
pub use stats::CacheStats;
pub use typed::MemoryCache;
