//! `OrderedStore`: insertion-ordered key/value container with a token form.
//!
//! Keys are normalized on every access (see [`Key`]), values are
//! `serde_json::Value`. The store's canonical text form is its token: both
//! `Display` and [`OrderedStore::encode`] produce it, and
//! [`OrderedStore::decode`] / [`OrderedStore::from_token`] read it back.
//!
//! # Ownership
//!
//! The store has no interior mutability and no locking. Code that shares one
//! store between threads must wrap the whole store in its own `Mutex`.
//! Mutating while iterating is ruled out by the borrow checker; to drop
//! entries during an ordered walk, use [`OrderedStore::retain`].

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::iter::FusedIterator;
use std::ops::Index;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{Result, StoreError};
use crate::key::Key;
use crate::value::{first_non_finite, IntoValue};

/// An ordered mapping from normalized keys to JSON values.
#[derive(Clone, Default)]
pub struct OrderedStore {
    entries: IndexMap<Key, Value>,
    /// Key used by the next `push`; `None` once `i64::MAX` has been used.
    next_index: NextIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NextIndex(Option<i64>);

impl Default for NextIndex {
    fn default() -> Self {
        NextIndex(Some(0))
    }
}

impl NextIndex {
    /// Move past `key` if it is an integer at or beyond the current index.
    fn observe(&mut self, key: &Key) {
        if let (Key::Int(n), Some(next)) = (key, self.0) {
            if *n >= next {
                self.0 = n.checked_add(1);
            }
        }
    }
}

/// Anything that can supply a token to [`OrderedStore::decode`].
///
/// Implemented for strings and for stores themselves: decoding from another
/// store copies that store's current contents through its encoded token.
pub trait TokenSource {
    fn token(&self) -> Result<Cow<'_, str>>;
}

impl TokenSource for str {
    fn token(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Borrowed(self))
    }
}

impl TokenSource for String {
    fn token(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Borrowed(self.as_str()))
    }
}

impl TokenSource for OrderedStore {
    fn token(&self) -> Result<Cow<'_, str>> {
        self.encode().map(Cow::Owned)
    }
}

impl<T: TokenSource + ?Sized> TokenSource for &T {
    fn token(&self) -> Result<Cow<'_, str>> {
        (**self).token()
    }
}

impl OrderedStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a token, or from another store's contents.
    ///
    /// Never fails: an unusable token yields an empty store.
    pub fn from_token(source: impl TokenSource) -> Self {
        let mut store = Self::new();
        store.decode(source);
        store
    }

    /// Strictly decode a token with the default [`Codec`], returning the
    /// reason when it cannot be decoded.
    pub fn try_decode(token: &str) -> Result<Self> {
        Codec::default().decode(token)
    }

    /// Turn a structural JSON value into a store.
    ///
    /// Object keys are normalized; array elements are keyed by position.
    /// Any other JSON value is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            Value::Array(items) => Ok(items.into_iter().enumerate().collect()),
            other => Err(StoreError::NotAMapping {
                found: json_kind(&other),
            }),
        }
    }

    /// Insert or overwrite `key`. An overwritten entry keeps its position;
    /// a new entry goes to the end.
    ///
    /// Floats are not accepted here; see [`IntoValue`].
    pub fn set(&mut self, key: impl Into<Key>, value: impl IntoValue) -> &mut Self {
        let key = normalize(key);
        self.next_index.observe(&key);
        self.entries.insert(key, value.into_value());
        self
    }

    /// Insert any serializable value.
    ///
    /// Fails with [`StoreError::NonFinite`] when a NaN or infinite float
    /// appears anywhere in the value, and with [`StoreError::Unrepresentable`]
    /// when `serde_json` refuses it (for example a map with non-string keys).
    /// The store is left untouched on failure.
    pub fn try_set<T>(&mut self, key: impl Into<Key>, value: &T) -> Result<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        if let Some(found) = first_non_finite(value) {
            return Err(StoreError::NonFinite { value: found });
        }
        let value = serde_json::to_value(value).map_err(StoreError::Unrepresentable)?;
        Ok(self.set(key, value))
    }

    /// Insert a float, rejecting NaN and infinities.
    ///
    /// `serde_json` silently turns non-finite floats into `null`; this is the
    /// checked alternative.
    pub fn set_float(&mut self, key: impl Into<Key>, value: f64) -> Result<&mut Self> {
        let number = Number::from_f64(value).ok_or(StoreError::NonFinite { value })?;
        Ok(self.set(key, Value::Number(number)))
    }

    /// Append `value` under the next free integer key.
    ///
    /// The next key is one past the largest integer key ever inserted (never
    /// below 0). Removing entries does not make their keys reusable.
    pub fn push(&mut self, value: impl IntoValue) -> Result<&mut Self> {
        let index = self.next_index.0.ok_or(StoreError::IndexExhausted)?;
        Ok(self.set(index, value))
    }

    /// The stored value, or `None` when the key is absent. A stored `null`
    /// comes back as `Some(&Value::Null)`.
    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.entries.get(&normalize(key))
    }

    pub fn get_mut(&mut self, key: impl Into<Key>) -> Option<&mut Value> {
        self.entries.get_mut(&normalize(key))
    }

    /// Whether an entry exists, whatever its value.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.entries.contains_key(&normalize(key))
    }

    /// Remove `key` if present. Remaining entries keep their order.
    pub fn remove(&mut self, key: impl Into<Key>) -> &mut Self {
        self.entries.shift_remove(&normalize(key));
        self
    }

    /// `set` each pair in order.
    pub fn add_all<K, V, I>(&mut self, entries: I) -> &mut Self
    where
        K: Into<Key>,
        V: IntoValue,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
        self
    }

    /// Keep only the entries for which `keep` returns true, visiting them in
    /// order. The closure may also edit the values it keeps.
    pub fn retain(&mut self, mut keep: impl FnMut(&Key, &mut Value) -> bool) -> &mut Self {
        self.entries.retain(|key, value| keep(key, value));
        self
    }

    /// Remove every entry and reset the push index.
    pub fn clear(&mut self) -> &mut Self {
        *self = Self::new();
        self
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order. Calling `iter` again starts from the first entry.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &Key> + ExactSizeIterator + '_ {
        self.entries.keys()
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &Value> + ExactSizeIterator + '_ {
        self.entries.values()
    }

    /// The structural form written into tokens: a JSON array when the keys
    /// are exactly `0..n` in order, a JSON object otherwise.
    pub fn to_value(&self) -> Value {
        if self.is_list() {
            Value::Array(self.entries.values().cloned().collect())
        } else {
            let map: Map<String, Value> = self
                .entries
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect();
            Value::Object(map)
        }
    }

    /// Encode the current contents with the default [`Codec`].
    pub fn encode(&self) -> Result<String> {
        Codec::default().encode(self)
    }

    /// Replace the contents with those decoded from `source`.
    ///
    /// Fail-soft: if the token is malformed, does not inflate, or does not
    /// hold a JSON object or array, the store ends up empty and no error is
    /// returned. The reason is logged at debug level; use
    /// [`OrderedStore::try_decode`] to get it as a value.
    pub fn decode(&mut self, source: impl TokenSource) -> &mut Self {
        self.decode_with(&Codec::default(), source)
    }

    /// [`OrderedStore::decode`] with an explicit codec.
    pub fn decode_with(&mut self, codec: &Codec, source: impl TokenSource) -> &mut Self {
        let decoded = source.token().and_then(|token| codec.decode(&token));
        *self = decoded.unwrap_or_else(|error| {
            debug!(%error, "token rejected, store reset to empty");
            Self::new()
        });
        self
    }

    /// Keys are exactly `0, 1, .., n-1` in insertion order.
    fn is_list(&self) -> bool {
        self.entries
            .keys()
            .enumerate()
            .all(|(i, key)| matches!(key, Key::Int(n) if usize::try_from(*n).ok() == Some(i)))
    }
}

/// Every key that reaches the map goes through here, so a hand-built
/// `Key::Str("7")` lands on the same entry as `7`.
fn normalize(key: impl Into<Key>) -> Key {
    key.into().normalized()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Entry-wise equality; insertion order is not compared.
impl PartialEq for OrderedStore {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for OrderedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Writes the token, exactly as [`OrderedStore::encode`] returns it.
///
/// A store that cannot be encoded (see [`Codec::encode`]) writes nothing,
/// which reads back as an empty store; the reason is logged at warn level.
impl fmt::Display for OrderedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(token) => f.write_str(&token),
            Err(error) => {
                warn!(
                    %error,
                    entries = self.len(),
                    "store cannot be encoded, writing an empty token"
                );
                Ok(())
            }
        }
    }
}

/// Fail-soft parse: an unusable token yields an empty store.
impl FromStr for OrderedStore {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_token(s))
    }
}

/// `store[key]` is the stored value, or `Value::Null` when absent.
///
/// Indexing cannot tell a missing key from a stored `null`; use
/// [`OrderedStore::has`] or [`OrderedStore::get`] when that matters.
impl<K: Into<Key>> Index<K> for OrderedStore {
    type Output = Value;

    fn index(&self, key: K) -> &Value {
        static NULL: Value = Value::Null;
        self.get(key).unwrap_or(&NULL)
    }
}

impl<K: Into<Key>, V: IntoValue> FromIterator<(K, V)> for OrderedStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Self::new();
        store.add_all(iter);
        store
    }
}

impl<K: Into<Key>, V: IntoValue> Extend<(K, V)> for OrderedStore {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

impl Serialize for OrderedStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.is_list() {
            serializer.collect_seq(self.entries.values())
        } else {
            serializer.collect_map(self.entries.iter().map(|(key, value)| (key.to_string(), value)))
        }
    }
}

impl<'de> Deserialize<'de> for OrderedStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

/// Borrowing iterator over a store's entries, in insertion order.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: indexmap::map::Iter<'a, Key, Value>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Key, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a OrderedStore {
    type Item = (&'a Key, &'a Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owning iterator over a store's entries, in insertion order.
#[derive(Debug)]
pub struct IntoIter {
    inner: indexmap::map::IntoIter<Key, Value>,
}

impl Iterator for IntoIter {
    type Item = (Key, Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for IntoIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for IntoIter {}

impl IntoIterator for OrderedStore {
    type Item = (Key, Value);
    type IntoIter = IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.entries.into_iter(),
        }
    }
}
