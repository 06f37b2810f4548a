//! Cache key derivation
//!
//! Turns a finalized [`CallRecord`] into a file name. Short records keep a
//! literal, human-readable rendering such as `ones[3,3;]`; long ones fall
//! back to a truncated SHA256 digest of that rendering.
//!
//! # Canonical rendering
//!
//! Each entry renders as `name[positional;keywords]`:
//!
//! | Part | Rendering |
//! |------|-----------|
//! | positional | values joined by `,` in argument order |
//! | keyword | `key=value` joined by `_`, in insertion order |
//! | `true` keyword | `key` alone |
//! | `false` keyword | omitted |
//!
//! Entries are joined by `_`. Keyword order is insertion order, not
//! sorted: the same keywords supplied in a different order give a
//! different literal key.

use crate::record::{CallEntry, CallRecord};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Extension appended to every key (storage format of the file store)
pub const KEY_SUFFIX: &str = ".json";

/// Version of the hashed-key digest scheme, persisted with every entry
pub const KEY_DIGEST_VERSION: u32 = 1;

/// Hex characters of the SHA256 digest kept in hashed keys
const DIGEST_HEX_LEN: usize = 16;

/// Rendering above this many characters is hashed
pub const DEFAULT_MAX_KEY_LEN: usize = 40;

/// Key derivation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOptions {
    /// Longest canonical rendering kept literal
    pub max_len: usize,
    /// Never hash, always keep the literal rendering
    pub full: bool,
}

impl Default for KeyOptions {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_KEY_LEN,
            full: false,
        }
    }
}

/// Derived cache key: `prefix + segments + suffix`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: String,
    hashed: bool,
}

impl CacheKey {
    /// Wrap an existing entry name (as found on disk or in a reference)
    ///
    /// Hashed-ness is read from the shape of the name: it ends in
    /// `[hash_<digest>]` or `hash_<digest>`, where a literal rendering
    /// always ends in a `;...]` argument list.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let hashed = is_hashed_stem(name.strip_suffix(KEY_SUFFIX).unwrap_or(&name));
        Self { name, hashed }
    }

    /// Full name including prefix and suffix
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Name without the storage suffix
    pub fn stem(&self) -> &str {
        self.name.strip_suffix(KEY_SUFFIX).unwrap_or(&self.name)
    }

    /// Whether the segment part is a digest rather than a literal rendering
    pub fn is_hashed(&self) -> bool {
        self.hashed
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Derives cache keys from call records
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver {
    options: KeyOptions,
}

impl KeyDeriver {
    pub fn new(options: KeyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> KeyOptions {
        self.options
    }

    /// Derive the key for `record` under `prefix`
    pub fn derive(&self, record: &CallRecord, prefix: &str) -> CacheKey {
        let canonical = canonical(record);
        let too_long = canonical.chars().count() > self.options.max_len;
        let must_hash = (!self.options.full && too_long) || !is_path_safe(&canonical);

        let (segments, hashed) = if must_hash {
            (hashed_segments(record, &canonical), true)
        } else {
            (canonical, false)
        };

        CacheKey {
            name: format!("{}{}{}", prefix, segments, KEY_SUFFIX),
            hashed,
        }
    }
}

/// Derive a key with explicit settings
pub fn derive(record: &CallRecord, prefix: &str, max_len: usize, full: bool) -> CacheKey {
    KeyDeriver::new(KeyOptions { max_len, full }).derive(record, prefix)
}

/// Full canonical rendering of a record (entries joined by `_`)
pub fn canonical(record: &CallRecord) -> String {
    record
        .entries()
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("_")
}

/// Stable digest of a canonical rendering
pub fn digest(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let result = hasher.finalize();

    hex::encode(result)[..DIGEST_HEX_LEN].to_string()
}

fn render_entry(entry: &CallEntry) -> String {
    let positional = entry
        .args()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let keywords = entry
        .kwargs()
        .iter()
        .filter_map(|(k, v)| match v {
            Value::Bool(true) => Some(k.clone()),
            Value::Bool(false) => None,
            other => Some(format!("{}={}", k, other)),
        })
        .collect::<Vec<_>>()
        .join("_");

    format!("{}[{};{}]", entry.name(), positional, keywords)
}

fn hashed_segments(record: &CallRecord, canonical: &str) -> String {
    let digest = digest(canonical);
    match record.entries() {
        [only] if is_path_safe(only.name()) => format!("{}[hash_{}]", only.name(), digest),
        _ => format!("hash_{}", digest),
    }
}

fn is_hashed_stem(stem: &str) -> bool {
    const MARKER: &str = "hash_";

    if let Some(inner) = stem.strip_suffix(']') {
        return inner
            .rfind('[')
            .and_then(|open| inner[open + 1..].strip_prefix(MARKER))
            .is_some_and(is_digest);
    }

    stem.len()
        .checked_sub(MARKER.len() + DIGEST_HEX_LEN)
        .and_then(|start| stem.get(start..))
        .and_then(|tail| tail.strip_prefix(MARKER))
        .is_some_and(is_digest)
}

fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Whether `s` can be used inside a single file name component
fn is_path_safe(s: &str) -> bool {
    !s.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}
