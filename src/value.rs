//! Stand-ins for the embedding language's value system.
//!
//! `spec.md` treats *Value*, *Blob*, *Dict*, *List*, *Error* and *Instant* as
//! external collaborators belonging to the language this core is embedded
//! in. This crate doesn't own a scripting-language runtime, so these are
//! just the narrowest Rust types that let the rest of the crate compile
//! and be tested: a byte buffer, an insertion-ordered string map that folds
//! repeated keys into a list, and a small header-value sum type.

use indexmap::IndexMap;
use std::fmt;

/// Raw bytes, as they cross the wire. Qore's `binary` type.
pub type Blob = Vec<u8>;

/// A single header (or FTP reply) value: either one string, or several
/// when the same name was seen more than once.
///
/// `spec.md` §4.1 ("repeated header names become a list value") and
/// Design Note ("Duplicated header canonicalisation... specify one
/// normalised form (comma-joined string) internally and surface the list
/// to the caller on demand") are both satisfied by this type: `as_str()`
/// gives the normalised comma-joined form, `as_list()` the raw list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Seen exactly once.
    Single(String),
    /// Seen more than once, in the order encountered.
    Multi(Vec<String>),
}

impl HeaderValue {
    /// Internal normalised form: a single comma-joined string.
    pub fn as_str(&self) -> String {
        match self {
            HeaderValue::Single(s) => s.clone(),
            HeaderValue::Multi(v) => v.join(", "),
        }
    }

    /// The list form, whatever the arity.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            HeaderValue::Single(s) => vec![s.clone()],
            HeaderValue::Multi(v) => v.clone(),
        }
    }

    /// Fold another occurrence of the same header name into this value.
    pub fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(existing) => {
                *self = HeaderValue::Multi(vec![existing.clone(), value]);
            }
            HeaderValue::Multi(v) => v.push(value),
        }
    }

    /// True if this header name was only ever seen once.
    pub fn is_single(&self) -> bool {
        matches!(self, HeaderValue::Single(_))
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Single(s)
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Single(s.to_string())
    }
}

/// An insertion-ordered `name -> value` mapping, used for HTTP header
/// dicts, FTP reply maps, and anything else `spec.md` calls a *Dict*.
pub type Dict = IndexMap<String, HeaderValue>;

/// Insert a header, folding into a [`HeaderValue::Multi`] if the name is
/// already present, the way `readHTTPHeader` folds repeated header lines.
pub fn dict_insert_folding(dict: &mut Dict, key: String, value: String) {
    match dict.get_mut(&key) {
        Some(existing) => existing.push(value),
        None => {
            dict.insert(key, HeaderValue::Single(value));
        }
    }
}

/// Set (overwrite) a single-valued entry, the way options and defaults are
/// applied rather than folded.
pub fn dict_set(dict: &mut Dict, key: impl Into<String>, value: impl Into<String>) {
    dict.insert(key.into(), HeaderValue::Single(value.into()));
}

/// Case-insensitive header lookup (HTTP header names are case-insensitive;
/// this crate stores keys lower-cased on parse but callers may supply any
/// case via the public API).
pub fn dict_get_ci<'a>(dict: &'a Dict, key: &str) -> Option<&'a HeaderValue> {
    let lower = key.to_ascii_lowercase();
    dict.get(&lower)
}
