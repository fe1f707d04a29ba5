//! Value codecs used by byte-oriented tiers.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheResult;

/// Converts typed values to and from the byte payloads stored by a tier.
pub trait ValueCodec: Send + Sync {
    /// Encodes `value` into a payload.
    fn encode<V: Serialize>(&self, value: &V) -> CacheResult<Vec<u8>>;

    /// Decodes a payload produced by [`ValueCodec::encode`].
    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> CacheResult<V>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode<V: Serialize>(&self, value: &V) -> CacheResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> CacheResult<V> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
