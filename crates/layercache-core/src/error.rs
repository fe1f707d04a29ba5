//! Error types for cache tiers and the multilevel orchestrator.
//!
//! Usage errors (bad key, wrong expiration count, absent payload) are raised
//! before any tier is touched. Backend errors come from an individual tier and
//! are propagated unchanged; the orchestrator never retries or fails over.

use std::fmt;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The key was empty or consisted only of whitespace.
    #[error("Invalid key: the {parameter} cannot be empty or white space")]
    InvalidKey {
        /// Name of the offending parameter.
        parameter: &'static str,
    },

    /// The number of per-tier expirations did not match the number of tiers.
    #[error("Expiration mismatch: expected {expected} expirations (one per tier), got {actual}")]
    ExpirationMismatch {
        /// Number of tiers in the cache.
        expected: usize,
        /// Number of expirations supplied.
        actual: usize,
    },

    /// A payload was required but none was supplied.
    #[error("Null value: the {parameter} cannot be absent")]
    NullValue {
        /// Name of the offending parameter.
        parameter: &'static str,
    },

    /// Entry options were out of range (e.g. a zero sliding window).
    #[error("Invalid options: {message}")]
    InvalidOptions {
        /// Description of the problem.
        message: String,
    },

    /// A tier reported a failure while serving the request.
    #[error("Backend error in {tier}: {message}")]
    Backend {
        /// Name of the tier that failed.
        tier: String,
        /// Description of the failure.
        message: String,
    },

    /// A remote tier could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// A value could not be encoded to or decoded from its stored form.
    #[error("Codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// The cache could not be built from the supplied configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl CacheError {
    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(parameter: &'static str) -> Self {
        Self::InvalidKey { parameter }
    }

    /// Creates a new `ExpirationMismatch` error.
    #[must_use]
    pub fn expiration_mismatch(expected: usize, actual: usize) -> Self {
        Self::ExpirationMismatch { expected, actual }
    }

    /// Creates a new `NullValue` error.
    #[must_use]
    pub fn null_value(parameter: &'static str) -> Self {
        Self::NullValue { parameter }
    }

    /// Creates a new `InvalidOptions` error.
    #[must_use]
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(tier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            tier: tier.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Codec` error.
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this is an invalid key error.
    #[must_use]
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey { .. })
    }

    /// Returns `true` if this is an expiration count mismatch.
    #[must_use]
    pub fn is_expiration_mismatch(&self) -> bool {
        matches!(self, Self::ExpirationMismatch { .. })
    }

    /// Returns `true` if this is a null value error.
    #[must_use]
    pub fn is_null_value(&self) -> bool {
        matches!(self, Self::NullValue { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidKey { .. }
            | Self::ExpirationMismatch { .. }
            | Self::NullValue { .. }
            | Self::InvalidOptions { .. } => ErrorCategory::Usage,
            Self::Backend { .. } | Self::Connection { .. } => ErrorCategory::Backend,
            Self::Codec { .. } => ErrorCategory::Codec,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::codec(err.to_string())
    }
}

/// Categories of cache errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The caller passed an invalid argument.
    Usage,
    /// A tier failed or could not be reached.
    Backend,
    /// Encoding or decoding a value failed.
    Codec,
    /// The cache was misconfigured.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => write!(f, "usage"),
            Self::Backend => write!(f, "backend"),
            Self::Codec => write!(f, "codec"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::invalid_key("key");
        assert_eq!(
            err.to_string(),
            "Invalid key: the key cannot be empty or white space"
        );

        let err = CacheError::expiration_mismatch(3, 1);
        assert_eq!(
            err.to_string(),
            "Expiration mismatch: expected 3 expirations (one per tier), got 1"
        );

        let err = CacheError::backend("redis", "connection reset");
        assert_eq!(err.to_string(), "Backend error in redis: connection reset");
    }

    #[test]
    fn test_error_predicates() {
        assert!(CacheError::invalid_key("key").is_invalid_key());
        assert!(!CacheError::invalid_key("key").is_null_value());
        assert!(CacheError::expiration_mismatch(2, 3).is_expiration_mismatch());
        assert!(CacheError::null_value("value").is_null_value());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            CacheError::invalid_key("key").category(),
            ErrorCategory::Usage
        );
        assert_eq!(
            CacheError::null_value("value").category(),
            ErrorCategory::Usage
        );
        assert_eq!(
            CacheError::connection("refused").category(),
            ErrorCategory::Backend
        );
        assert_eq!(CacheError::codec("eof").category(), ErrorCategory::Codec);
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CacheError = err.into();
        assert_eq!(err.category(), ErrorCategory::Codec);
    }
}
