//! Token codec: store contents ⇄ compact text token.
//!
//! A token is built in three stages, and decoding runs them in reverse:
//!
//! 1. **Structure**: the store is written as JSON. A store keyed exactly
//!    `0..n` in order becomes a JSON array, anything else a JSON object with
//!    integer keys spelled in decimal.
//! 2. **Compression**: the JSON bytes are compressed as a raw DEFLATE stream
//!    (no zlib or gzip framing).
//! 3. **Text safety**: the compressed bytes are written with the standard
//!    base64 alphabet (`+`, `/`, `=` padding).
//!
//! Decoding accepts tokens with or without trailing `=` padding, since query
//! string parsers commonly treat the padding as a key/value separator. The
//! JSON payload is capped at [`Codec::inflate_limit`] bytes because tokens
//! arrive through user-editable URLs, and encoding enforces the same cap so a
//! token the codec writes is always one it can read.
//!
//! # Example
//! ```
//! use cereal_core::{Codec, OrderedStore};
//!
//! let mut store = OrderedStore::new();
//! store.set("a", 1);
//!
//! let codec = Codec::new().level(9);
//! let token = codec.encode(&store).unwrap();
//! assert_eq!(codec.decode(&token).unwrap(), store);
//! ```

use std::io::{Read, Write};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::store::OrderedStore;

/// Default DEFLATE level, matching zlib's own default.
pub const DEFAULT_LEVEL: u32 = 6;

/// Default ceiling on the inflated JSON payload (1 MiB).
pub const DEFAULT_MAX_INFLATED_LEN: usize = 1 << 20;

/// Deepest container nesting a token may carry, counting the store itself.
///
/// `serde_json` refuses to parse a 128th nested array or object, so a deeper
/// store would encode into a token that no codec can read back.
pub const MAX_DEPTH: usize = 127;

/// Standard alphabet, padded on output, padding-indifferent on input.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encoder/decoder settings for store tokens.
///
/// The level only affects how small the token is; any level decodes with any
/// codec. The payload limit applies both ways: `encode` refuses a store whose
/// JSON is larger than the limit, and `decode` refuses a token that inflates
/// past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    level: u32,
    max_inflated_len: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    /// A codec with [`DEFAULT_LEVEL`] and [`DEFAULT_MAX_INFLATED_LEN`].
    pub const fn new() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            max_inflated_len: DEFAULT_MAX_INFLATED_LEN,
        }
    }

    /// Set the DEFLATE level (0 = stored, 9 = smallest). Values above 9 are clamped.
    pub const fn level(mut self, level: u32) -> Self {
        self.level = if level > 9 { 9 } else { level };
        self
    }

    /// Set the largest inflated payload, in bytes, that decoding will accept.
    pub const fn max_inflated_len(mut self, len: usize) -> Self {
        self.max_inflated_len = len;
        self
    }

    pub fn compression_level(&self) -> u32 {
        self.level
    }

    pub fn inflate_limit(&self) -> usize {
        self.max_inflated_len
    }

    /// Encode the store's current contents into a token.
    ///
    /// Only stores this codec can decode again are encoded: nesting deeper
    /// than [`MAX_DEPTH`] fails with [`StoreError::TooDeep`], and JSON larger
    /// than [`Codec::inflate_limit`] fails with [`StoreError::PayloadTooLarge`].
    pub fn encode(&self, store: &OrderedStore) -> Result<String> {
        if nesting_depth(store) > MAX_DEPTH {
            return Err(StoreError::TooDeep { limit: MAX_DEPTH });
        }
        let json = serde_json::to_vec(store)?;
        if json.len() > self.max_inflated_len {
            return Err(StoreError::PayloadTooLarge {
                limit: self.max_inflated_len,
            });
        }
        let compressed = self.deflate(&json)?;
        Ok(TOKEN_ENGINE.encode(compressed))
    }

    /// Strictly decode a token into a new store, reporting why it failed.
    ///
    /// This is the diagnostic counterpart of the fail-soft
    /// [`OrderedStore::decode`].
    pub fn decode(&self, token: &str) -> Result<OrderedStore> {
        OrderedStore::from_value(self.decode_value(token)?)
    }

    /// Decode a token down to its structural JSON form (object or array).
    pub fn decode_value(&self, token: &str) -> Result<Value> {
        if token.is_empty() {
            return Err(StoreError::EmptyToken);
        }
        let compressed = TOKEN_ENGINE.decode(token)?;
        let json = self.inflate(&compressed)?;
        Ok(serde_json::from_slice(&json)?)
    }

    fn deflate(&self, json: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(
            Vec::with_capacity(json.len() / 2 + 16),
            Compression::new(self.level),
        );
        encoder.write_all(json).map_err(StoreError::Deflate)?;
        encoder.finish().map_err(StoreError::Deflate)
    }

    /// Inflate at most `max_inflated_len` bytes; one byte more means the
    /// payload is over the limit.
    fn inflate(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        let limit = self.max_inflated_len;
        let mut out = Vec::new();
        DeflateDecoder::new(compressed)
            .take((limit as u64).saturating_add(1))
            .read_to_end(&mut out)
            .map_err(StoreError::Inflate)?;
        if out.len() > limit {
            return Err(StoreError::PayloadTooLarge { limit });
        }
        Ok(out)
    }
}

/// Container depth of the store's JSON form; the store itself is level 1.
/// Stops counting once past [`MAX_DEPTH`].
fn nesting_depth(store: &OrderedStore) -> usize {
    let mut deepest = 1;
    let mut pending: Vec<(&Value, usize)> = store.values().map(|value| (value, 1)).collect();
    while let Some((value, depth)) = pending.pop() {
        let child_depth = depth + 1;
        match value {
            Value::Array(items) => pending.extend(items.iter().map(|child| (child, child_depth))),
            Value::Object(map) => pending.extend(map.values().map(|child| (child, child_depth))),
            _ => continue,
        }
        deepest = deepest.max(child_depth);
        if deepest > MAX_DEPTH {
            break;
        }
    }
    deepest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for_json(json: &str) -> String {
        let compressed = Codec::new().deflate(json.as_bytes()).unwrap();
        TOKEN_ENGINE.encode(compressed)
    }

    #[test]
    fn deflate_is_raw_without_zlib_header() {
        let compressed = Codec::new().deflate(b"{\"a\":1}").unwrap();
        // A zlib stream would start with 0x78.
        assert_ne!(compressed[0], 0x78);
        assert_eq!(Codec::new().inflate(&compressed).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn level_is_clamped() {
        assert_eq!(Codec::new().level(42).compression_level(), 9);
        assert_eq!(Codec::new().level(0).compression_level(), 0);
    }

    #[test]
    fn inflate_limit_is_inclusive() {
        let json = r#"{"k":"0123456789"}"#;
        let token = token_for_json(json);
        assert!(Codec::new().max_inflated_len(json.len()).decode(&token).is_ok());
        let err = Codec::new()
            .max_inflated_len(json.len() - 1)
            .decode(&token)
            .unwrap_err();
        assert!(matches!(err, StoreError::PayloadTooLarge { limit } if limit == json.len() - 1));
    }

    #[test]
    fn padding_is_optional_on_decode() {
        let token = token_for_json(r#"{"a":true}"#);
        let unpadded = token.trim_end_matches('=');
        assert_eq!(
            Codec::new().decode_value(&token).unwrap(),
            Codec::new().decode_value(unpadded).unwrap()
        );
    }

    #[test]
    fn scalar_payload_is_not_a_mapping() {
        let err = Codec::new().decode(&token_for_json("5")).unwrap_err();
        assert!(matches!(err, StoreError::NotAMapping { found: "a number" }));
    }

    fn nested_arrays(levels: usize) -> Value {
        (0..levels).fold(Value::Null, |inner, _| Value::Array(vec![inner]))
    }

    #[test]
    fn depth_counts_the_store_as_one_level() {
        let mut store = OrderedStore::new();
        assert_eq!(nesting_depth(&store), 1);
        store.set("flat", 1);
        assert_eq!(nesting_depth(&store), 1);
        store.set("deep", nested_arrays(3));
        assert_eq!(nesting_depth(&store), 4);
    }

    #[test]
    fn deepest_decodable_store_round_trips() {
        let mut store = OrderedStore::new();
        store.set("v", nested_arrays(MAX_DEPTH - 1));
        let token = Codec::new().encode(&store).unwrap();
        assert_eq!(Codec::new().decode(&token).unwrap(), store);

        store.set("v", nested_arrays(MAX_DEPTH));
        assert!(matches!(
            Codec::new().encode(&store).unwrap_err(),
            StoreError::TooDeep { limit: MAX_DEPTH }
        ));
    }

    #[test]
    fn empty_token_is_reported_as_such() {
        assert!(matches!(
            Codec::new().decode("").unwrap_err(),
            StoreError::EmptyToken
        ));
    }
}
