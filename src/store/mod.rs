//! Blob store: durable persistence of cache entries
//!
//! The protocol in [`crate::memo`] only talks to the [`BlobStore`] trait.
//! [`FileStore`] is the file-backed implementation: one JSON document per
//! entry, named by its cache key.
//!
//! # Entry Layout
//!
//! | Field | Description |
//! |-------|-------------|
//! | `format_version` | Layout version of the document |
//! | `digest_version` | Version of the hashed-key scheme that named it |
//! | `record` | Call record snapshot the key was derived from |
//! | `result` | Cached result value |

pub mod file;

pub use file::FileStore;

use crate::error::RecallResult;
use crate::key::{CacheKey, KEY_DIGEST_VERSION};
use crate::record::CallRecord;
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current layout version of persisted entries
pub const ENTRY_FORMAT_VERSION: u32 = 1;

/// Persisted unit: a call record snapshot and its result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format_version: u32,
    pub digest_version: u32,
    pub record: CallRecord,
    pub result: Value,
}

impl CacheEntry {
    pub fn new(record: CallRecord, result: Value) -> Self {
        Self {
            format_version: ENTRY_FORMAT_VERSION,
            digest_version: KEY_DIGEST_VERSION,
            record,
            result,
        }
    }
}

/// A stored entry as seen by a directory scan
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub key: CacheKey,
    pub path: PathBuf,
    pub modified: Option<DateTime<Utc>>,
}

/// Durable key to entry persistence
///
/// Implementations are single-writer: no locking is performed and
/// concurrent writers of the same key are not coordinated.
pub trait BlobStore {
    /// Check whether an entry exists under `key`
    fn exists(&self, key: &CacheKey) -> RecallResult<bool>;

    /// Load only the call record of an entry, skipping the result payload
    fn load_record(&self, key: &CacheKey) -> RecallResult<CallRecord>;

    /// Load a complete entry
    fn load_entry(&self, key: &CacheKey) -> RecallResult<CacheEntry>;

    /// Persist a new entry; fails with `Overwrite` if `key` is taken
    fn save_new(&self, key: &CacheKey, entry: &CacheEntry) -> RecallResult<()>;

    /// All stored entries whose name starts with `prefix`, sorted by name
    fn list(&self, prefix: &str) -> RecallResult<Vec<StoredBlob>>;
}
