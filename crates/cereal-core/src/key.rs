//! Store keys and the loose-numeric normalization rule.
//!
//! A key is either an integer or a string. Strings written in canonical
//! decimal form (`"0"`, `"42"`, `"-7"`) are folded into the integer they
//! spell, so `1` and `"1"` address the same entry. Anything else that merely
//! looks numeric (`"01"`, `"+1"`, `"-0"`, `" 1"`, `"1.0"`, digit strings
//! outside the `i64` range) stays a distinct string key.

use std::fmt;

/// A normalized store key.
///
/// Construct keys through the `From` conversions; they apply normalization,
/// so `Key::from("12") == Key::Int(12)`. A `Key::Str` built directly may
/// still spell an integer; [`Key::normalized`] folds it, and the store runs
/// every key through it before touching its entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// The integer form, if this key is an integer key.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(n) => Some(*n),
            Key::Str(_) => None,
        }
    }

    /// The string form, if this key is a string key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Int(_) => None,
            Key::Str(s) => Some(s),
        }
    }

    /// Whether this key is an integer key.
    pub fn is_int(&self) -> bool {
        matches!(self, Key::Int(_))
    }

    /// Apply normalization to a key that may have been built by hand.
    pub fn normalized(self) -> Key {
        match self {
            Key::Str(s) => Key::from(s),
            int => int,
        }
    }
}

/// Parse `s` as a canonical decimal integer: `0` or `-?[1-9][0-9]*`, in range.
fn canonical_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    match digits.as_bytes() {
        [] => return None,
        // "0" is canonical, "-0" is not
        [b'0'] => return (digits.len() == s.len()).then_some(0),
        [b'0', ..] => return None,
        bytes if !bytes.iter().all(u8::is_ascii_digit) => return None,
        _ => {}
    }
    s.parse().ok()
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        match canonical_int(s) {
            Some(n) => Key::Int(n),
            None => Key::Str(s.to_string()),
        }
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        match canonical_int(&s) {
            Some(n) => Key::Int(n),
            None => Key::Str(s),
        }
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::from(s.as_str())
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

macro_rules! key_from_small_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(n: $t) -> Self {
                    Key::Int(i64::from(n))
                }
            }
        )*
    };
}

key_from_small_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! key_from_wide_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                /// Values past `i64::MAX` keep their decimal spelling as a string key.
                fn from(n: $t) -> Self {
                    match i64::try_from(n) {
                        Ok(n) => Key::Int(n),
                        Err(_) => Key::Str(n.to_string()),
                    }
                }
            }
        )*
    };
}

key_from_wide_int!(u64, usize, isize);

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}
