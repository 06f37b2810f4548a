//! Lazy references to stored results
//!
//! A [`LazyRef`] names a cache entry without loading it. It can be passed
//! as an argument to further cached calls; the protocol resolves it to the
//! stored value right before the computation runs on a miss. Outside the
//! cache machinery, [`LazyRef::materialize`] is the explicit deref point.
//!
//! A reference is only valid while its entry exists on disk. Nothing tracks
//! or cleans up references.

use crate::error::{RecallError, RecallResult};
use crate::key::CacheKey;
use crate::record::{CallEntry, CallRecord};
use crate::store::BlobStore;
use crate::value::{FromValue, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Handle to a stored cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LazyRef {
    key: String,
}

impl LazyRef {
    pub fn new(key: &CacheKey) -> Self {
        Self {
            key: key.as_str().to_string(),
        }
    }

    /// Entry name this reference points to
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_name(self.key.clone())
    }

    /// Whether the referenced entry still exists
    pub fn is_valid<S: BlobStore + ?Sized>(&self, store: &S) -> RecallResult<bool> {
        store.exists(&self.cache_key())
    }

    /// Load the referenced value
    pub fn materialize<S: BlobStore + ?Sized>(&self, store: &S) -> RecallResult<Value> {
        let key = self.cache_key();
        if !store.exists(&key)? {
            return Err(RecallError::DanglingReference {
                key: self.key.clone(),
            });
        }
        debug!("Resolving reference {}", self.key);
        Ok(store.load_entry(&key)?.result)
    }

    /// Load the referenced value and convert it to `T`
    pub fn materialize_as<S, T>(&self, store: &S) -> RecallResult<T>
    where
        S: BlobStore + ?Sized,
        T: FromValue,
    {
        self.materialize(store)?.into_typed()
    }
}

impl fmt::Display for LazyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref({})", self.cache_key().stem())
    }
}

/// Replace a top-level reference with the value it points to
pub fn resolve_value<S: BlobStore + ?Sized>(store: &S, value: Value) -> RecallResult<Value> {
    match value {
        Value::Ref(r) => r.materialize(store),
        other => Ok(other),
    }
}

/// Resolve every reference among positional and keyword arguments
pub fn resolve_all<S: BlobStore + ?Sized>(
    store: &S,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> RecallResult<(Vec<Value>, Vec<(String, Value)>)> {
    let args = args
        .into_iter()
        .map(|v| resolve_value(store, v))
        .collect::<RecallResult<Vec<_>>>()?;
    let kwargs = kwargs
        .into_iter()
        .map(|(k, v)| Ok((k, resolve_value(store, v)?)))
        .collect::<RecallResult<Vec<_>>>()?;
    Ok((args, kwargs))
}

/// Resolve every reference in a single call entry
pub fn resolve_entry<S: BlobStore + ?Sized>(store: &S, entry: CallEntry) -> RecallResult<CallEntry> {
    let (name, args, kwargs) = entry.into_parts();
    let (args, kwargs) = resolve_all(store, args, kwargs)?;
    Ok(CallEntry::from_parts(name, args, kwargs))
}

/// Resolve every reference in every entry of a record
pub fn resolve_record<S: BlobStore + ?Sized>(
    store: &S,
    record: CallRecord,
) -> RecallResult<CallRecord> {
    let entries = record
        .into_entries()
        .into_iter()
        .map(|e| resolve_entry(store, e))
        .collect::<RecallResult<Vec<_>>>()?;
    Ok(CallRecord::from_entries(entries))
}
