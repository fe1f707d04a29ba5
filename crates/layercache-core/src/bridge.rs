//! Typed access to a multilevel byte cache through a value codec.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheResult;
use crate::cascade::{self, ByteLevel, Level};
use crate::codec::{JsonCodec, ValueCodec};
use crate::distributed::MultilevelByteCache;
use crate::traits::{ByteCache, Cache, Factory};
use crate::types::EntryOptions;

/// Exposes a [`MultilevelByteCache`] as a [`Cache<V>`].
///
/// Values are encoded with `C` before they reach the byte tiers and decoded
/// on the way back. An expiration passed to the typed API becomes a relative
/// expiration on every byte tier.
pub struct CodecCache<C = JsonCodec> {
    inner: Arc<MultilevelByteCache>,
    codec: C,
}

impl CodecCache<JsonCodec> {
    /// Wraps `inner` with the JSON codec.
    pub fn json(inner: Arc<MultilevelByteCache>) -> Self {
        Self::new(inner, JsonCodec)
    }
}

impl<C: ValueCodec> CodecCache<C> {
    pub fn new(inner: Arc<MultilevelByteCache>, codec: C) -> Self {
        Self { inner, codec }
    }

    /// The underlying byte cache.
    pub fn inner(&self) -> &Arc<MultilevelByteCache> {
        &self.inner
    }

    /// Typed read-through with one expiration per byte tier.
    ///
    /// Hits are decoded before any tier is backfilled, so a payload that
    /// fails to decode is reported without being copied into earlier tiers.
    /// A freshly computed value is encoded once and returned as-is.
    pub fn get_or_add_multi<V, F>(
        &self,
        key: &str,
        factory: F,
        expirations: &[Duration],
    ) -> CacheResult<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> V,
    {
        let options: Vec<EntryOptions> = expirations
            .iter()
            .map(|ttl| EntryOptions::relative(*ttl))
            .collect();
        let levels: Vec<_> = self
            .inner
            .caches()
            .iter()
            .map(|tier| DecodingLevel::new(tier, &self.codec))
            .collect();

        let entry = cascade::read_through(&levels, key, &options, || {
            let value = factory();
            let bytes = self.codec.encode(&value)?;
            Ok(Encoded { value, bytes })
        })?;
        Ok(entry.value)
    }

    /// Typed read returning only the decoded hit.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<V>> {
        self.inner
            .get(key)?
            .map(|bytes| self.codec.decode(&bytes))
            .transpose()
    }
}

/// A value together with the payload it was read from or encoded into.
struct Encoded<V> {
    value: V,
    bytes: Vec<u8>,
}

/// Byte tier that decodes on lookup and writes the stored payload on fill.
struct DecodingLevel<'a, C, V> {
    tier: ByteLevel<'a>,
    codec: &'a C,
    value: PhantomData<fn() -> V>,
}

impl<'a, C, V> DecodingLevel<'a, C, V> {
    fn new(tier: &'a Arc<dyn ByteCache>, codec: &'a C) -> Self {
        Self {
            tier: ByteLevel(tier),
            codec,
            value: PhantomData,
        }
    }
}

impl<C: ValueCodec, V: DeserializeOwned> Level for DecodingLevel<'_, C, V> {
    type Value = Encoded<V>;
    type Policy = EntryOptions;

    fn lookup(&self, key: &str) -> CacheResult<Option<Encoded<V>>> {
        let Some(bytes) = self.tier.lookup(key)? else {
            return Ok(None);
        };
        let value = self.codec.decode(&bytes)?;
        Ok(Some(Encoded { value, bytes }))
    }

    fn fill(&self, key: &str, entry: &Encoded<V>, policy: &EntryOptions) -> CacheResult<()> {
        self.tier.fill(key, &entry.bytes, policy)
    }

    fn name(&self) -> &'static str {
        self.tier.name()
    }
}

impl<V, C> Cache<V> for CodecCache<C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: ValueCodec,
{
    fn try_get(&self, key: &str) -> CacheResult<Option<V>> {
        self.get(key)
    }

    fn set(&self, key: &str, value: V, expiration: Duration) -> CacheResult<()> {
        let bytes = self.codec.encode(&value)?;
        self.inner
            .set(key, Some(bytes.as_slice()), &EntryOptions::relative(expiration))
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.inner.remove(key)
    }

    fn get_or_add_with(
        &self,
        key: &str,
        factory: Factory<'_, V>,
        expiration: Duration,
    ) -> CacheResult<V> {
        let expirations = vec![expiration; self.inner.len()];
        self.get_or_add_multi(key, factory, &expirations)
    }

    fn backend_name(&self) -> &'static str {
        "codec"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheExt;
    use crate::distributed::DynByteCache;
    use crate::mock::{Call, RecordingByteCache};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        roles: Vec<String>,
    }

    fn session() -> Session {
        Session {
            user: "ada".to_string(),
            roles: vec!["admin".to_string()],
        }
    }

    fn setup(n: usize) -> (Vec<Arc<RecordingByteCache>>, CodecCache) {
        let recorders: Vec<_> = (0..n).map(|_| Arc::new(RecordingByteCache::new())).collect();
        let tiers = recorders
            .iter()
            .map(|r| r.clone() as DynByteCache)
            .collect();
        let inner = Arc::new(MultilevelByteCache::new(tiers).unwrap());
        (recorders, CodecCache::json(inner))
    }

    #[test]
    fn test_miss_encodes_and_fills_every_tier() {
        let (recorders, cache) = setup(2);

        let value: Session = cache
            .get_or_add_multi(
                "s",
                session,
                &[Duration::from_secs(5), Duration::from_secs(60)],
            )
            .unwrap();

        assert_eq!(value, session());
        let stored = recorders[1].peek("s").unwrap();
        assert_eq!(stored, serde_json::to_vec(&session()).unwrap());
        assert_eq!(
            recorders[0].options_of("s"),
            Some(EntryOptions::relative(Duration::from_secs(5)))
        );
        assert_eq!(
            recorders[1].options_of("s"),
            Some(EntryOptions::relative(Duration::from_secs(60)))
        );
    }

    #[test]
    fn test_hit_is_decoded_and_backfilled() {
        let (recorders, cache) = setup(2);
        recorders[1].seed("s", &serde_json::to_vec(&session()).unwrap());

        let value: Session = cache
            .get_or_add(
                "s",
                || -> Session { panic!("factory must not run") },
                Duration::from_secs(1),
            )
            .unwrap();

        assert_eq!(value, session());
        assert!(recorders[0].peek("s").is_some());
        assert_eq!(recorders[1].calls(), vec![Call::Get]);
    }

    #[test]
    fn test_corrupt_payload_is_a_codec_error() {
        let (recorders, cache) = setup(1);
        recorders[0].seed("s", b"not json");

        let err = Cache::<Session>::try_get(&cache, "s").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Codec);
    }

    #[test]
    fn test_undecodable_hit_is_not_backfilled() {
        let (recorders, cache) = setup(2);
        recorders[1].seed("s", b"not json");

        let err = cache
            .get_or_add_multi(
                "s",
                || -> u32 { panic!("factory must not run on a hit") },
                &[Duration::from_secs(1), Duration::from_secs(1)],
            )
            .unwrap_err();

        assert_eq!(err.category(), crate::ErrorCategory::Codec);
        assert_eq!(recorders[0].peek("s"), None);
        assert_eq!(recorders[0].calls(), vec![Call::Get]);
        assert_eq!(recorders[1].peek("s"), Some(b"not json".to_vec()));
    }

    #[test]
    fn test_set_and_remove_go_through_every_tier() {
        let (recorders, cache) = setup(2);

        cache.set("n", 42_u32, Duration::from_secs(3)).unwrap();
        assert_eq!(Cache::<u32>::try_get(&cache, "n").unwrap(), Some(42));
        for recorder in &recorders {
            assert_eq!(recorder.peek("n"), Some(b"42".to_vec()));
        }

        Cache::<u32>::remove(&cache, "n").unwrap();
        assert_eq!(Cache::<u32>::try_get(&cache, "n").unwrap(), None);
    }
}
