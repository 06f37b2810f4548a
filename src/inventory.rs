//! Cache inventory for auditing
//!
//! Enumerates stored entries under a prefix and loads only their call
//! records. Read-only: nothing here writes to or deletes from the store.
//! An entry whose record cannot be read is still listed, with the reason
//! in place of the record.

use crate::error::RecallResult;
use crate::key::CacheKey;
use crate::record::CallRecord;
use crate::store::BlobStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// One stored entry and the record it was computed from
#[derive(Debug, Clone, Serialize)]
pub struct InventoryEntry {
    /// Entry name (cache key including prefix and suffix)
    pub name: String,
    /// Location on disk
    pub path: PathBuf,
    /// Stored record, `None` when the entry could not be read
    pub record: Option<CallRecord>,
    pub modified: Option<DateTime<Utc>>,
    /// Why the record could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InventoryEntry {
    pub fn key(&self) -> CacheKey {
        CacheKey::from_name(self.name.clone())
    }

    /// Whether the entry name is a digest rather than a literal rendering
    pub fn is_hashed(&self) -> bool {
        self.key().is_hashed()
    }

    pub fn is_readable(&self) -> bool {
        self.record.is_some()
    }
}

/// List entries whose name starts with `prefix`, sorted by name
pub fn list_entries<S: BlobStore + ?Sized>(
    store: &S,
    prefix: &str,
) -> RecallResult<Vec<InventoryEntry>> {
    let blobs = store.list(prefix)?;
    let mut entries = Vec::with_capacity(blobs.len());

    for blob in blobs {
        let (record, error) = match store.load_record(&blob.key) {
            Ok(record) => (Some(record), None),
            Err(e) => {
                warn!("Unreadable cache entry {}: {}", blob.key, e);
                (None, Some(e.to_string()))
            }
        };
        entries.push(InventoryEntry {
            name: blob.key.as_str().to_string(),
            path: blob.path,
            record,
            modified: blob.modified,
            error,
        });
    }

    debug!("Inventory for prefix {:?}: {} entries", prefix, entries.len());
    Ok(entries)
}
