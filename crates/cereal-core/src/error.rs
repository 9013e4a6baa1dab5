//! Error types for store mutation and token encoding/decoding.

use thiserror::Error;

/// Errors that can occur while building, encoding, or strictly decoding a store.
///
/// The fail-soft entry points ([`OrderedStore::decode`](crate::OrderedStore::decode),
/// [`OrderedStore::from_token`](crate::OrderedStore::from_token)) never surface
/// these; [`OrderedStore::try_decode`](crate::OrderedStore::try_decode) does.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The token was the empty string.
    #[error("token is empty")]
    EmptyToken,

    /// The token contained characters outside the standard base64 alphabet,
    /// or had an impossible length.
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The base64 payload was not a valid raw DEFLATE stream.
    #[error("token payload failed to inflate: {0}")]
    Inflate(#[source] std::io::Error),

    /// The JSON payload is larger than the codec's size limit, either after
    /// inflating a token or before compressing a store.
    #[error("JSON payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// A stored value nests containers deeper than a token can carry.
    #[error("value nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    /// The inflated payload was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON payload was valid but was neither an object nor an array.
    #[error("decoded payload is {found}, expected an object or array")]
    NotAMapping { found: &'static str },

    /// The DEFLATE encoder failed while compressing (encoding path).
    #[error("compression error: {0}")]
    Deflate(#[source] std::io::Error),

    /// A value handed to `try_set` could not be converted to JSON.
    #[error("value cannot be represented: {0}")]
    Unrepresentable(#[source] serde_json::Error),

    /// A float handed to `set_float` or `try_set` was NaN or infinite.
    #[error("non-finite number {value} cannot be represented")]
    NonFinite { value: f64 },

    /// `push` found no integer index left above the largest existing one.
    #[error("no integer index left to push into")]
    IndexExhausted,
}

/// Convenience alias used throughout cereal-core.
pub type Result<T> = std::result::Result<T, StoreError>;
