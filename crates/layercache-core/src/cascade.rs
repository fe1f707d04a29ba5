//! The read-through cascade shared by both cache flavors.
//!
//! ```text
//! probe:    L0 miss → L1 miss → L2 HIT          (frontier = 2)
//! backfill: L0 ← v,  L1 ← v                     (L2.. untouched)
//!
//! probe:    L0 miss → L1 miss → L2 miss         (frontier = 3)
//! factory:  v = f()
//! backfill: L0 ← v,  L1 ← v,  L2 ← v
//! ```
//!
//! Tier calls are strictly sequential and index-ascending. Any tier error
//! aborts the operation immediately; tiers after the failing one are not
//! visited.

use std::sync::Arc;

use crate::CacheResult;
use crate::error::CacheError;
use crate::traits::{ByteCache, Cache};
use crate::types::{EntryOptions, validate_key};

/// One tier as seen by the cascade: a lookup and a write with a per-tier policy.
pub(crate) trait Level {
    type Value;
    type Policy;

    fn lookup(&self, key: &str) -> CacheResult<Option<Self::Value>>;

    fn fill(&self, key: &str, value: &Self::Value, policy: &Self::Policy) -> CacheResult<()>;

    fn name(&self) -> &'static str;
}

/// Result of probing tiers in order.
pub(crate) struct Probe<V> {
    /// Number of leading tiers that missed.
    pub frontier: usize,
    /// Value from the tier at `frontier`, if any tier hit.
    pub found: Option<V>,
}

/// Rejects a request before any tier is touched.
pub(crate) fn check_request(key: &str, policies: usize, tiers: usize) -> CacheResult<()> {
    validate_key(key)?;
    if policies != tiers {
        return Err(CacheError::expiration_mismatch(tiers, policies));
    }
    Ok(())
}

/// Visits tiers in order until one reports a hit.
pub(crate) fn probe<L: Level>(levels: &[L], key: &str) -> CacheResult<Probe<L::Value>> {
    for (index, level) in levels.iter().enumerate() {
        if let Some(value) = level.lookup(key)? {
            return Ok(hit(key, index, level.name(), value));
        }
    }
    Ok(miss(key, levels.len()))
}

fn hit<V>(key: &str, index: usize, tier: &str, value: V) -> Probe<V> {
    tracing::debug!(key = %key, level = index, tier, "cache hit");
    Probe {
        frontier: index,
        found: Some(value),
    }
}

fn miss<V>(key: &str, tiers: usize) -> Probe<V> {
    tracing::debug!(key = %key, tiers, "cache miss on every tier");
    Probe {
        frontier: tiers,
        found: None,
    }
}

/// The probed value, or the factory's on a full miss.
fn resolve<V, F>(found: Option<V>, factory: F) -> CacheResult<V>
where
    F: FnOnce() -> CacheResult<V>,
{
    match found {
        Some(value) => Ok(value),
        None => factory(),
    }
}

/// The tiers a read-through refills, paired with their policies: every tier
/// before `frontier`, in order.
fn fill_targets<'a, T, P>(
    tiers: &'a [T],
    policies: &'a [P],
    frontier: usize,
) -> impl Iterator<Item = (&'a T, &'a P)> {
    tiers.iter().zip(policies).take(frontier)
}

fn backfilled(key: &str, frontier: usize) {
    if frontier > 0 {
        tracing::debug!(key = %key, filled = frontier, "backfilled tiers");
    }
}

/// Writes `value` into the first `frontier` tiers, each with its own policy.
pub(crate) fn backfill<L: Level>(
    levels: &[L],
    key: &str,
    value: &L::Value,
    policies: &[L::Policy],
    frontier: usize,
) -> CacheResult<()> {
    for (level, policy) in fill_targets(levels, policies, frontier) {
        level.fill(key, value, policy)?;
    }
    backfilled(key, frontier);
    Ok(())
}

/// Full read-through: validate, probe, compute on a full miss, backfill.
///
/// The factory runs at most once, and only when no tier holds the key.
pub(crate) fn read_through<L, F>(
    levels: &[L],
    key: &str,
    policies: &[L::Policy],
    factory: F,
) -> CacheResult<L::Value>
where
    L: Level,
    F: FnOnce() -> CacheResult<L::Value>,
{
    check_request(key, policies.len(), levels.len())?;

    let Probe { frontier, found } = probe(levels, key)?;
    let value = resolve(found, factory)?;

    backfill(levels, key, &value, policies, frontier)?;
    Ok(value)
}

/// Typed tier adapter: backfill clones the resolved value into each tier.
pub(crate) struct TypedLevel<'a, V>(pub &'a Arc<dyn Cache<V>>);

impl<V: Clone> Level for TypedLevel<'_, V> {
    type Value = V;
    type Policy = std::time::Duration;

    fn lookup(&self, key: &str) -> CacheResult<Option<V>> {
        self.0.try_get(key)
    }

    fn fill(&self, key: &str, value: &V, policy: &Self::Policy) -> CacheResult<()> {
        self.0.set(key, value.clone(), *policy)
    }

    fn name(&self) -> &'static str {
        self.0.backend_name()
    }
}

/// Byte tier adapter for the blocking path.
pub(crate) struct ByteLevel<'a>(pub &'a Arc<dyn ByteCache>);

impl Level for ByteLevel<'_> {
    type Value = Vec<u8>;
    type Policy = EntryOptions;

    fn lookup(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.0.get(key)
    }

    fn fill(&self, key: &str, value: &Vec<u8>, policy: &EntryOptions) -> CacheResult<()> {
        self.0.set(key, Some(value.as_slice()), policy)
    }

    fn name(&self) -> &'static str {
        self.0.backend_name()
    }
}

/// Async probe over byte tiers. Each tier call completes before the next starts.
pub(crate) async fn probe_async(
    tiers: &[Arc<dyn ByteCache>],
    key: &str,
) -> CacheResult<Probe<Vec<u8>>> {
    for (index, tier) in tiers.iter().enumerate() {
        if let Some(value) = tier.get_async(key).await? {
            return Ok(hit(key, index, tier.backend_name(), value));
        }
    }
    Ok(miss(key, tiers.len()))
}

/// Async form of [`read_through`] over byte tiers.
pub(crate) async fn read_through_async<F>(
    tiers: &[Arc<dyn ByteCache>],
    key: &str,
    policies: &[EntryOptions],
    factory: F,
) -> CacheResult<Vec<u8>>
where
    F: FnOnce() -> CacheResult<Vec<u8>>,
{
    check_request(key, policies.len(), tiers.len())?;

    let Probe { frontier, found } = probe_async(tiers, key).await?;
    let value = resolve(found, factory)?;

    for (tier, policy) in fill_targets(tiers, policies, frontier) {
        tier.set_async(key, Some(value.as_slice()), policy).await?;
    }
    backfilled(key, frontier);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Scripted level: `Some(v)` means the level holds `v`.
    struct Scripted<'a> {
        id: usize,
        held: Option<&'static str>,
        log: &'a RefCell<Vec<String>>,
        fail_fill: bool,
    }

    impl Level for Scripted<'_> {
        type Value = String;
        type Policy = u32;

        fn lookup(&self, _key: &str) -> CacheResult<Option<String>> {
            self.log.borrow_mut().push(format!("get{}", self.id));
            Ok(self.held.map(str::to_string))
        }

        fn fill(&self, _key: &str, value: &String, policy: &u32) -> CacheResult<()> {
            self.log
                .borrow_mut()
                .push(format!("set{}={value}@{policy}", self.id));
            if self.fail_fill {
                return Err(CacheError::backend("scripted", "fill failed"));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn levels<'a>(
        held: &[Option<&'static str>],
        log: &'a RefCell<Vec<String>>,
    ) -> Vec<Scripted<'a>> {
        held.iter()
            .enumerate()
            .map(|(id, held)| Scripted {
                id,
                held: *held,
                log,
                fail_fill: false,
            })
            .collect()
    }

    #[test]
    fn test_hit_in_middle_backfills_prefix_only() {
        let log = RefCell::new(Vec::new());
        let levels = levels(&[None, Some("v"), Some("stale")], &log);

        let value = read_through(&levels, "k", &[10, 20, 30], || {
            panic!("factory must not run on a hit")
        })
        .unwrap();

        assert_eq!(value, "v");
        assert_eq!(*log.borrow(), vec!["get0", "get1", "set0=v@10"]);
    }

    #[test]
    fn test_full_miss_writes_every_level_in_order() {
        let log = RefCell::new(Vec::new());
        let levels = levels(&[None, None], &log);

        let value = read_through(&levels, "k", &[1, 2], || Ok("fresh".to_string())).unwrap();

        assert_eq!(value, "fresh");
        assert_eq!(
            *log.borrow(),
            vec!["get0", "get1", "set0=fresh@1", "set1=fresh@2"]
        );
    }

    #[test]
    fn test_hit_on_first_level_writes_nothing() {
        let log = RefCell::new(Vec::new());
        let levels = levels(&[Some("v"), None], &log);

        read_through(&levels, "k", &[1, 2], || Ok("unused".to_string())).unwrap();
        assert_eq!(*log.borrow(), vec!["get0"]);
    }

    #[test]
    fn test_validation_precedes_any_tier_call() {
        let log = RefCell::new(Vec::new());
        let levels = levels(&[None, None], &log);

        let err = read_through(&levels, "  ", &[1, 2], || Ok(String::new())).unwrap_err();
        assert!(err.is_invalid_key());

        let err = read_through(&levels, "k", &[1], || Ok(String::new())).unwrap_err();
        assert!(err.is_expiration_mismatch());

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_key_is_checked_before_expiration_count() {
        let err = check_request("", 1, 2).unwrap_err();
        assert!(err.is_invalid_key());
    }

    #[test]
    fn test_fill_failure_stops_backfill() {
        let log = RefCell::new(Vec::new());
        let mut levels = levels(&[None, None, None], &log);
        levels[0].fail_fill = true;

        let err = read_through(&levels, "k", &[1, 2, 3], || Ok("v".to_string())).unwrap_err();

        assert!(matches!(err, CacheError::Backend { .. }));
        assert_eq!(*log.borrow(), vec!["get0", "get1", "get2", "set0=v@1"]);
    }

    #[test]
    fn test_factory_error_propagates_without_writes() {
        let log = RefCell::new(Vec::new());
        let levels = levels(&[None], &log);

        let err = read_through(&levels, "k", &[1], || Err(CacheError::codec("boom"))).unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Codec);
        assert_eq!(*log.borrow(), vec!["get0"]);
    }

    #[test]
    fn test_fill_targets_stop_at_frontier() {
        let tiers = ["l0", "l1", "l2"];
        let policies = [1, 2, 3];

        let targets: Vec<_> = fill_targets(&tiers, &policies, 2).collect();
        assert_eq!(targets, vec![(&"l0", &1), (&"l1", &2)]);
        assert_eq!(fill_targets(&tiers, &policies, 0).count(), 0);
    }
}
