//! Keys and expiration policies shared by every tier.

use std::time::Duration;

use time::OffsetDateTime;

use crate::error::CacheError;
use crate::CacheResult;

/// Expiration used by the `*_default` convenience calls: one day.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Checks that a cache key is usable.
///
/// A key must contain at least one non-whitespace character.
///
/// # Errors
///
/// Returns `CacheError::InvalidKey` naming the `key` parameter otherwise.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.trim().is_empty() {
        return Err(CacheError::invalid_key("key"));
    }
    Ok(())
}

/// Expiration policy for a byte-flavor write.
///
/// `absolute_expiration_relative_to_now` takes precedence over
/// `absolute_expiration` when both are set. A sliding window, when present,
/// is re-armed by every read and by `refresh`, but never extends an entry
/// past its absolute deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Point in time after which the entry is gone.
    pub absolute_expiration: Option<OffsetDateTime>,
    /// Lifetime measured from the moment of the write.
    pub absolute_expiration_relative_to_now: Option<Duration>,
    /// Idle window after which an untouched entry is gone.
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Options that never expire the entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the entry `ttl` after it is written.
    pub fn relative(ttl: Duration) -> Self {
        Self {
            absolute_expiration_relative_to_now: Some(ttl),
            ..Self::default()
        }
    }

    /// Expire the entry at a fixed point in time.
    pub fn absolute(at: OffsetDateTime) -> Self {
        Self {
            absolute_expiration: Some(at),
            ..Self::default()
        }
    }

    /// Expire the entry after `window` without access.
    pub fn sliding(window: Duration) -> Self {
        Self {
            sliding_expiration: Some(window),
            ..Self::default()
        }
    }

    /// Adds a sliding window to these options.
    #[must_use]
    pub fn with_sliding(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// Checks the options against `now`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidOptions` for a zero relative lifetime, a
    /// zero sliding window, or an absolute deadline that is not in the future.
    pub fn validate(&self, now: OffsetDateTime) -> CacheResult<()> {
        if self.absolute_expiration_relative_to_now == Some(Duration::ZERO) {
            return Err(CacheError::invalid_options(
                "relative expiration must be positive",
            ));
        }
        if self.sliding_expiration == Some(Duration::ZERO) {
            return Err(CacheError::invalid_options(
                "sliding expiration must be positive",
            ));
        }
        if self.absolute_expiration_relative_to_now.is_none() {
            if let Some(at) = self.absolute_expiration {
                if at <= now {
                    return Err(CacheError::invalid_options(
                        "absolute expiration must be in the future",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Time left until the absolute deadline, measured from `now`.
    ///
    /// Returns `None` when the options carry no absolute component.
    pub fn absolute_ttl(&self, now: OffsetDateTime) -> Option<Duration> {
        if let Some(ttl) = self.absolute_expiration_relative_to_now {
            return Some(ttl);
        }
        self.absolute_expiration
            .map(|at| Duration::try_from(at - now).unwrap_or(Duration::ZERO))
    }

    /// Lifetime granted by a write made at `now`: the sliding window capped
    /// by the absolute deadline.
    pub fn initial_ttl(&self, now: OffsetDateTime) -> Option<Duration> {
        match (self.absolute_ttl(now), self.sliding_expiration) {
            (Some(absolute), Some(sliding)) => Some(absolute.min(sliding)),
            (absolute, sliding) => absolute.or(sliding),
        }
    }
}

impl From<Duration> for EntryOptions {
    fn from(ttl: Duration) -> Self {
        Self::relative(ttl)
    }
}
