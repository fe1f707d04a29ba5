//! Process-wide tracing setup.
//!
//! Installs a `tracing-subscriber` registry with a reloadable [`EnvFilter`]
//! and a `fmt` layer. At startup `RUST_LOG` takes precedence over the
//! configured level; [`apply_logging_level`] swaps the filter afterwards,
//! for example when [`LoggingSettings`] are reloaded.

use std::sync::OnceLock;

use layercache_core::{CacheError, CacheResult};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingSettings;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Set only by the call that installed the global subscriber.
static FILTER: OnceLock<FilterHandle> = OnceLock::new();

/// Installs tracing at the default `info` level.
pub fn init_tracing() -> CacheResult<bool> {
    init_tracing_from_settings(&LoggingSettings::default())
}

/// Installs tracing at the level from the `[logging]` settings.
pub fn init_tracing_from_settings(logging: &LoggingSettings) -> CacheResult<bool> {
    init_tracing_with_level(&logging.level)
}

/// Installs the global subscriber with `level` as its filter.
///
/// Returns `Ok(false)` if a global subscriber already exists; the existing
/// one and its filter are left untouched.
///
/// # Errors
///
/// `CacheError::Configuration` if `level` is not a level name.
pub fn init_tracing_with_level(level: &str) -> CacheResult<bool> {
    let configured = level_filter(level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or(configured);

    let (layer, handle) = reload::Layer::new(filter);
    let installed = tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        let _ = FILTER.set(handle);
        tracing::debug!(level, "tracing initialized");
    }
    Ok(installed)
}

/// Replaces the active filter with `level`.
///
/// # Errors
///
/// `CacheError::Configuration` if `level` is not a level name, or if tracing
/// was not installed through this module.
pub fn apply_logging_level(level: &str) -> CacheResult<()> {
    let filter = level_filter(level)?;
    let handle = FILTER
        .get()
        .ok_or_else(|| CacheError::configuration("tracing is not initialized"))?;
    handle
        .reload(filter)
        .map_err(|e| CacheError::configuration(format!("log filter reload failed: {e}")))?;
    tracing::info!(level, "logging level changed");
    Ok(())
}

/// The active filter, if tracing was installed through this module.
pub fn current_filter() -> Option<String> {
    FILTER.get()?.with_current(|f| f.to_string()).ok()
}

fn level_filter(level: &str) -> CacheResult<EnvFilter> {
    let parsed: LevelFilter = level
        .trim()
        .parse()
        .map_err(|_| CacheError::configuration(format!("invalid logging level {level:?}")))?;
    Ok(EnvFilter::new(parsed.to_string()))
}
