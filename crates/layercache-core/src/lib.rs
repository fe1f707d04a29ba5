//! # layercache-core
//!
//! Tier contracts and the multilevel read-through orchestrator.
//!
//! This crate contains no real storage. Concrete tiers live in
//! `layercache-memory` and `layercache-redis`; anything implementing
//! [`Cache`] or [`ByteCache`] can be stacked.
//!
//! ## Overview
//!
//! A multilevel cache is an ordered list of tiers, fastest first. A
//! read-through probes tiers in order, stops at the first hit, runs the
//! factory only when every tier misses, and then backfills the tiers that
//! missed, each with its own expiration:
//!
//! ```ignore
//! use layercache_core::prelude::*;
//!
//! let cache = MultilevelCache::new(vec![local, remote])?;
//! let user = cache.get_or_add_multi(
//!     "user:42",
//!     || load_user(42),
//!     &[Duration::from_secs(60), Duration::from_secs(3600)],
//! )?;
//! ```
//!
//! Two flavors exist:
//!
//! - [`MultilevelCache<V>`] over typed [`Cache<V>`] tiers.
//! - [`MultilevelByteCache`] over [`ByteCache`] tiers, with blocking and
//!   async entry points and [`EntryOptions`] expiration policies.
//!
//! [`CodecCache`] bridges the two, serving typed values out of byte tiers.

mod bridge;
pub(crate) mod cascade;
mod codec;
mod distributed;
mod error;
mod multilevel;
mod noop;
mod traits;
mod types;

#[cfg(test)]
mod mock;

pub use bridge::CodecCache;
pub use codec::{JsonCodec, ValueCodec};
pub use distributed::{DynByteCache, MultilevelByteCache};
pub use error::{CacheError, ErrorCategory};
pub use multilevel::{DynCache, MultilevelCache};
pub use noop::NoCache;
pub use traits::{ByteCache, Cache, CacheExt, Factory};
pub use types::{DEFAULT_EXPIRATION, EntryOptions, validate_key};

/// Type alias for a cache result.
pub type CacheResult<T> = Result<T, CacheError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use layercache_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bridge::CodecCache;
    pub use crate::codec::{JsonCodec, ValueCodec};
    pub use crate::distributed::{DynByteCache, MultilevelByteCache};
    pub use crate::error::{CacheError, ErrorCategory};
    pub use crate::multilevel::{DynCache, MultilevelCache};
    pub use crate::noop::NoCache;
    pub use crate::traits::{ByteCache, Cache, CacheExt};
    pub use crate::types::{DEFAULT_EXPIRATION, EntryOptions};
    pub use crate::{CacheResult, validate_key};
}
