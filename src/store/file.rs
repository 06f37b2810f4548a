//! File-backed blob store
//!
//! Each entry is a pretty-printed JSON document at `<root>/<key>`. Writes go
//! to a temporary file in the target directory and are moved into place
//! without clobbering, so a crashed write never leaves a partial entry.

use super::{BlobStore, CacheEntry, StoredBlob, ENTRY_FORMAT_VERSION};
use crate::error::{RecallError, RecallResult};
use crate::key::{CacheKey, KEY_SUFFIX};
use crate::record::CallRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Entry document with the result payload left unparsed
#[derive(Deserialize)]
struct RecordOnly {
    format_version: u32,
    record: CallRecord,
}

/// Blob store rooted at a cache directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for `key`
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    fn read(&self, key: &CacheKey) -> RecallResult<String> {
        let path = self.path_for(key);
        fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RecallError::EntryNotFound(key.to_string())
            } else {
                RecallError::io(format!("reading cache entry {}", path.display()), e)
            }
        })
    }
}

fn check_format(found: u32) -> RecallResult<()> {
    if found != ENTRY_FORMAT_VERSION {
        return Err(RecallError::UnsupportedFormat {
            found,
            expected: ENTRY_FORMAT_VERSION,
        });
    }
    Ok(())
}

impl BlobStore for FileStore {
    fn exists(&self, key: &CacheKey) -> RecallResult<bool> {
        let path = self.path_for(key);
        path.try_exists()
            .map_err(|e| RecallError::io(format!("checking cache entry {}", path.display()), e))
    }

    fn load_record(&self, key: &CacheKey) -> RecallResult<CallRecord> {
        let content = self.read(key)?;
        let header: RecordOnly = serde_json::from_str(&content)?;
        check_format(header.format_version)?;
        Ok(header.record)
    }

    fn load_entry(&self, key: &CacheKey) -> RecallResult<CacheEntry> {
        let content = self.read(key)?;
        let entry: CacheEntry = serde_json::from_str(&content)?;
        check_format(entry.format_version)?;
        Ok(entry)
    }

    fn save_new(&self, key: &CacheKey, entry: &CacheEntry) -> RecallResult<()> {
        let path = self.path_for(key);
        if self.exists(key)? {
            return Err(RecallError::Overwrite {
                key: key.to_string(),
            });
        }

        let parent = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent).map_err(|e| {
            RecallError::io(format!("creating cache directory {}", parent.display()), e)
        })?;

        let content = serde_json::to_vec_pretty(entry)?;
        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|e| RecallError::io("creating temporary cache file", e))?;
        tmp.write_all(&content)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| RecallError::io("writing temporary cache file", e))?;

        tmp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == ErrorKind::AlreadyExists {
                RecallError::Overwrite {
                    key: key.to_string(),
                }
            } else {
                RecallError::io(format!("writing cache entry {}", path.display()), e.error)
            }
        })?;

        debug!("Stored cache entry {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    fn list(&self, prefix: &str) -> RecallResult<Vec<StoredBlob>> {
        // A prefix may address a subdirectory, e.g. "models/fit_"
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..=idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };
        let dir = self.root.join(dir_part);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(RecallError::io(
                    format!("reading cache directory {}", dir.display()),
                    e,
                ))
            }
        };

        let mut blobs = vec![];
        for entry in entries {
            let entry = entry.map_err(|e| RecallError::io("reading cache directory entry", e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.starts_with(name_prefix) || !file_name.ends_with(KEY_SUFFIX) {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| RecallError::io(format!("reading metadata of {}", file_name), e))?;
            if !metadata.is_file() {
                continue;
            }

            blobs.push(StoredBlob {
                key: CacheKey::from_name(format!("{}{}", dir_part, file_name)),
                path: entry.path(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        blobs.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        debug!("Found {} cache entries matching {}*", blobs.len(), prefix);
        Ok(blobs)
    }
}
