//! Cache lookup and store protocol
//!
//! [`Memo`] ties key derivation, the blob store and lazy references
//! together. A cached call goes through:
//!
//! 1. The caller finalizes a [`CallRecord`] describing the computation
//! 2. The record is snapshotted; the computation gets its own copy
//! 3. The key is derived and the store is checked
//! 4. Hit: the stored record is compared against the snapshot, then the
//!    value (or a reference to it) is returned without computing
//! 5. Miss: references among the arguments are resolved, the computation
//!    runs, and the snapshot is persisted together with the result
//!
//! The snapshot keeps references unresolved, so keys of downstream calls
//! stay short.
//!
//! There is no locking. Two processes missing on the same key will both
//! compute, and the second store fails with `Overwrite`.

use crate::config::Config;
use crate::error::{RecallError, RecallResult};
use crate::inventory::{self, InventoryEntry};
use crate::key::{CacheKey, KeyDeriver, KeyOptions};
use crate::record::{CallEntry, CallRecord};
use crate::reference::{resolve_entry, resolve_record, LazyRef};
use crate::store::{BlobStore, CacheEntry, FileStore};
use crate::value::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Record size above which storing logs an advisory warning
pub const DEFAULT_WARN_RECORD_BYTES: usize = 2000;

/// Memoization front end over a blob store
#[derive(Debug, Clone)]
pub struct Memo<S = FileStore> {
    store: S,
    deriver: KeyDeriver,
    warn_record_bytes: usize,
}

impl Memo<FileStore> {
    /// File-backed cache in `dir` with default key settings
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileStore::new(dir), KeyOptions::default())
    }

    /// File-backed cache configured from the `[cache]` section
    pub fn from_config(config: &Config) -> Self {
        Self::new(FileStore::new(config.cache.dir.clone()), config.cache.key_options())
            .with_warn_threshold(config.cache.warn_record_bytes)
    }
}

impl<S: BlobStore> Memo<S> {
    pub fn new(store: S, options: KeyOptions) -> Self {
        Self {
            store,
            deriver: KeyDeriver::new(options),
            warn_record_bytes: DEFAULT_WARN_RECORD_BYTES,
        }
    }

    /// Set the record size that triggers the large-parameter warning
    pub fn with_warn_threshold(mut self, bytes: usize) -> Self {
        self.warn_record_bytes = bytes;
        self
    }

    /// Underlying blob store
    pub fn blobs(&self) -> &S {
        &self.store
    }

    /// Key `record` would be stored under
    pub fn key_for(&self, record: &CallRecord, prefix: &str) -> CacheKey {
        self.deriver.derive(record, prefix)
    }

    /// Check whether `record` is cached, without loading the result
    ///
    /// On presence the stored record is compared with `record`; a mismatch
    /// is a collision and fails the lookup.
    pub fn check_presence(
        &self,
        record: &CallRecord,
        prefix: &str,
    ) -> RecallResult<(bool, CacheKey)> {
        let key = self.key_for(record, prefix);
        if !self.store.exists(&key)? {
            return Ok((false, key));
        }

        let stored = self.store.load_record(&key)?;
        verify_record(&key, &stored, record)?;
        Ok((true, key))
    }

    /// Look up `record` and load its result on a hit
    pub fn fetch(
        &self,
        record: &CallRecord,
        prefix: &str,
    ) -> RecallResult<(Option<Value>, CacheKey)> {
        let key = self.key_for(record, prefix);
        if !self.store.exists(&key)? {
            return Ok((None, key));
        }

        let entry = self.store.load_entry(&key)?;
        verify_record(&key, &entry.record, record)?;
        Ok((Some(entry.result), key))
    }

    /// Persist `value` as the result of `record`
    ///
    /// Fails with `Overwrite` if the key is already taken.
    pub fn store(&self, record: CallRecord, value: Value, prefix: &str) -> RecallResult<CacheKey> {
        let key = self.key_for(&record, prefix);
        self.persist(&key, record, value)?;
        Ok(key)
    }

    /// Return the cached result of `record`, computing and storing it on a miss
    ///
    /// `compute` receives the record with every lazy reference resolved.
    pub fn compute_or_fetch<F, V>(
        &self,
        record: CallRecord,
        prefix: &str,
        compute: F,
    ) -> RecallResult<Value>
    where
        F: FnOnce(CallRecord) -> RecallResult<V>,
        V: Into<Value>,
    {
        let snapshot = record.clone();
        let (cached, key) = self.fetch(&snapshot, prefix)?;
        if let Some(value) = cached {
            debug!("Cache hit: {}", key);
            return Ok(value);
        }

        debug!("Cache miss: {}", key);
        let value = self.run(record, compute)?;
        self.persist(&key, snapshot, value.clone())?;
        Ok(value)
    }

    /// Like [`compute_or_fetch`](Self::compute_or_fetch) but return a lazy
    /// reference; a hit never loads the stored result
    pub fn compute_or_fetch_ref<F, V>(
        &self,
        record: CallRecord,
        prefix: &str,
        compute: F,
    ) -> RecallResult<LazyRef>
    where
        F: FnOnce(CallRecord) -> RecallResult<V>,
        V: Into<Value>,
    {
        let snapshot = record.clone();
        let (present, key) = self.check_presence(&snapshot, prefix)?;
        if present {
            debug!("Cache hit (reference): {}", key);
            return Ok(LazyRef::new(&key));
        }

        debug!("Cache miss (reference): {}", key);
        let value = self.run(record, compute)?;
        self.persist(&key, snapshot, value)?;
        Ok(LazyRef::new(&key))
    }

    /// Load the value a reference points to
    pub fn deref_value(&self, reference: &LazyRef) -> RecallResult<Value> {
        reference.materialize(&self.store)
    }

    /// Resolve references in `entry` and call `f` with it, without caching
    pub fn deref_call<F, T>(&self, entry: CallEntry, f: F) -> RecallResult<T>
    where
        F: FnOnce(CallEntry) -> RecallResult<T>,
    {
        f(resolve_entry(&self.store, entry)?)
    }

    /// Stored entries whose name starts with `prefix`
    pub fn list_entries(&self, prefix: &str) -> RecallResult<Vec<InventoryEntry>> {
        inventory::list_entries(&self.store, prefix)
    }

    fn run<F, V>(&self, record: CallRecord, compute: F) -> RecallResult<Value>
    where
        F: FnOnce(CallRecord) -> RecallResult<V>,
        V: Into<Value>,
    {
        let resolved = if record.has_refs() {
            resolve_record(&self.store, record)?
        } else {
            record
        };
        compute(resolved).map(Into::into)
    }

    /// Estimated size of `record` when it exceeds the warning threshold
    fn oversized(&self, record: &CallRecord) -> Option<usize> {
        let size = record.estimated_size();
        (size > self.warn_record_bytes).then_some(size)
    }

    fn persist(&self, key: &CacheKey, record: CallRecord, value: Value) -> RecallResult<()> {
        if let Some(size) = self.oversized(&record) {
            warn!(
                "Call record for {} is ~{} bytes (threshold {}); every stored entry carries it. \
                 Pass large inputs as references instead",
                key, size, self.warn_record_bytes
            );
        }

        self.store.save_new(key, &CacheEntry::new(record, value))?;
        debug!("Cache store: {}", key);
        Ok(())
    }
}

fn verify_record(key: &CacheKey, stored: &CallRecord, requested: &CallRecord) -> RecallResult<()> {
    if stored != requested {
        return Err(RecallError::Collision {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Matrix;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn test_memo() -> (Memo, TempDir) {
        let temp = TempDir::new().unwrap();
        (Memo::open(temp.path()), temp)
    }

    fn ones(n: i64) -> CallRecord {
        CallRecord::single(CallEntry::new("ones").arg(n).arg(n))
    }

    fn compute_ones(record: CallRecord) -> RecallResult<Matrix> {
        let entry = record.primary()?;
        let rows = entry.positional_as::<i64>(0)? as usize;
        let cols = entry.positional_as::<i64>(1)? as usize;
        Ok(Matrix::ones(rows, cols))
    }

    #[test]
    fn store_then_fetch() {
        let (memo, _temp) = test_memo();
        let key = memo.store(ones(3), Matrix::ones(3, 3).into(), "p_").unwrap();

        let (value, fetched_key) = memo.fetch(&ones(3), "p_").unwrap();
        assert_eq!(value, Some(Matrix::ones(3, 3).into()));
        assert_eq!(fetched_key, key);
    }

    #[test]
    fn miss_creates_nothing() {
        let (memo, temp) = test_memo();
        let (present, key) = memo.check_presence(&ones(3), "p_").unwrap();

        assert!(!present);
        assert_eq!(key.as_str(), "p_ones[3,3;].json");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn double_store_fails() {
        let (memo, _temp) = test_memo();
        memo.store(ones(2), Value::Int(1), "").unwrap();
        let err = memo.store(ones(2), Value::Int(2), "").unwrap_err();
        assert!(matches!(err, RecallError::Overwrite { .. }));
    }

    #[test]
    fn compute_runs_once() {
        let (memo, _temp) = test_memo();
        let calls = Cell::new(0);
        let compute = |r: CallRecord| {
            calls.set(calls.get() + 1);
            compute_ones(r)
        };

        let first = memo.compute_or_fetch(ones(3), "p_", compute).unwrap();
        let second = memo.compute_or_fetch(ones(3), "p_", compute).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(first, Matrix::ones(3, 3).into());
    }

    #[test]
    fn collision_is_fatal() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        let memo = Memo::new(store.clone(), KeyOptions::default());
        let key = memo.key_for(&ones(3), "");

        // Plant a different record under the same key
        let other = CallRecord::single(CallEntry::new("ones").arg(4).arg(4));
        store
            .save_new(&key, &CacheEntry::new(other, Value::Null))
            .unwrap();

        assert!(matches!(
            memo.check_presence(&ones(3), ""),
            Err(RecallError::Collision { .. })
        ));
        assert!(matches!(
            memo.compute_or_fetch(ones(3), "", compute_ones),
            Err(RecallError::Collision { .. })
        ));
    }

    #[test]
    fn reference_mode_skips_loading_on_hit() {
        let (memo, _temp) = test_memo();
        let r1 = memo.compute_or_fetch_ref(ones(3), "", compute_ones).unwrap();
        let r2 = memo
            .compute_or_fetch_ref(ones(3), "", |_| -> RecallResult<Value> {
                panic!("must not recompute")
            })
            .unwrap();

        assert_eq!(r1, r2);
        assert_eq!(memo.deref_value(&r1).unwrap(), Matrix::ones(3, 3).into());
    }

    #[test]
    fn references_are_resolved_before_compute_and_kept_in_key() {
        let (memo, _temp) = test_memo();
        let r = memo.compute_or_fetch_ref(ones(3), "", compute_ones).unwrap();

        let record = CallRecord::single(CallEntry::new("total").arg(r.clone()));
        let value = memo
            .compute_or_fetch(record.clone(), "", |resolved| {
                let m: Matrix = resolved.primary()?.positional_as(0)?;
                Ok(m.sum())
            })
            .unwrap();
        assert_eq!(value, Value::Float(9.0));

        let key = memo.key_for(&record, "");
        assert_eq!(key.stem(), "total[ref(ones[3,3;]);]");
        let stored = memo.blobs().load_record(&key).unwrap();
        assert!(stored.has_refs());
    }

    #[test]
    fn deref_call_resolves_without_caching() {
        let (memo, temp) = test_memo();
        let r1 = memo.compute_or_fetch_ref(ones(3), "", compute_ones).unwrap();
        let r2 = memo.compute_or_fetch_ref(ones(3), "", compute_ones).unwrap();
        let before = std::fs::read_dir(temp.path()).unwrap().count();

        let twos = memo
            .deref_call(CallEntry::new("+").arg(r1).arg(r2), |e| {
                let a: Matrix = e.positional_as(0)?;
                let b: Matrix = e.positional_as(1)?;
                a.add(&b)
            })
            .unwrap();

        assert_eq!(twos, Matrix::filled(3, 3, 2.0));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), before);
    }

    #[test]
    fn computation_error_stores_nothing() {
        let (memo, _temp) = test_memo();
        let result = memo.compute_or_fetch(ones(3), "", |_| -> RecallResult<Value> {
            Err(RecallError::User("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(!memo.check_presence(&ones(3), "").unwrap().0);
    }

    #[test]
    fn large_record_still_stored() {
        let (memo, _temp) = test_memo();
        let memo = memo.with_warn_threshold(10);
        let record = CallRecord::single(CallEntry::new("sum").arg(Matrix::ones(10, 10)));
        assert!(memo.oversized(&record).is_some_and(|size| size > 10));

        memo.compute_or_fetch(record.clone(), "", |_| Ok(100.0)).unwrap();
        assert!(memo.check_presence(&record, "").unwrap().0);
    }

    #[test]
    fn small_record_is_not_oversized() {
        let (memo, _temp) = test_memo();
        assert_eq!(memo.oversized(&ones(3)), None);
    }

    #[test]
    fn infinite_result_is_fetched_back() {
        let (memo, _temp) = test_memo();
        let calls = Cell::new(0);
        let div = || CallRecord::single(CallEntry::new("div").arg(1.0).arg(0.0));
        let compute = |r: CallRecord| -> RecallResult<f64> {
            calls.set(calls.get() + 1);
            let entry = r.primary()?;
            Ok(entry.positional_as::<f64>(0)? / entry.positional_as::<f64>(1)?)
        };

        let first = memo.compute_or_fetch(div(), "", compute).unwrap();
        let second = memo.compute_or_fetch(div(), "", compute).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, Value::Float(f64::INFINITY));
        assert_eq!(second, first);
    }

    #[test]
    fn nan_argument_hits_without_collision() {
        let (memo, _temp) = test_memo();
        let calls = Cell::new(0);
        let record = || CallRecord::single(CallEntry::new("f").arg(f64::NAN));
        let compute = |r: CallRecord| -> RecallResult<bool> {
            calls.set(calls.get() + 1);
            Ok(r.primary()?.positional_as::<f64>(0)?.is_nan())
        };

        let first = memo.compute_or_fetch(record(), "", compute).unwrap();
        let second = memo.compute_or_fetch(record(), "", compute).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, Value::Bool(true));
        assert_eq!(second, first);
        assert_eq!(memo.key_for(&record(), "").as_str(), "f[NaN;].json");
    }
}
