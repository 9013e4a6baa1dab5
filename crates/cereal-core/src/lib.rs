//! # cereal-core
//!
//! An insertion-ordered key/value store whose whole contents round-trip
//! through a single compact, URL-embeddable text token.
//!
//! The store is meant for small settings-like state that an application wants
//! to carry in a link or a form field instead of a database. A token is the
//! store's JSON form, compressed with raw DEFLATE and written in standard
//! base64. Decoding is fail-soft: a token a user mangled in the address bar
//! produces an empty store, never an error.
//!
//! ## Quick start
//!
//! ```rust
//! use cereal_core::{OrderedStore, Value};
//!
//! let mut settings = OrderedStore::new();
//! settings.set("theme", "dark").set(2, true).set("columns", 3);
//!
//! let token = settings.encode().unwrap();
//!
//! // "2" and 2 address the same entry
//! let restored = OrderedStore::from_token(&token);
//! assert_eq!(restored.get("2"), Some(&Value::Bool(true)));
//! assert_eq!(restored.to_string(), token);
//!
//! // garbage degrades to an empty store
//! let broken = OrderedStore::from_token("not a valid token!!");
//! assert!(broken.is_empty());
//! ```
//!
//! ## Modules
//!
//! - [`store`]: `OrderedStore`, its iterators, and the `TokenSource` trait
//! - [`key`]: `Key` and the loose-numeric key normalization rule
//! - [`codec`]: `Codec`, JSON → DEFLATE → base64 and back
//! - [`error`]: error type for strict decoding and checked inserts
//! - [`value`]: `IntoValue`, the float-free conversion `set` accepts

pub mod codec;
pub mod error;
pub mod key;
pub mod store;
pub mod value;

pub use codec::Codec;
pub use error::{Result, StoreError};
pub use key::Key;
pub use serde_json::Value;
pub use store::{OrderedStore, TokenSource};
pub use value::IntoValue;
