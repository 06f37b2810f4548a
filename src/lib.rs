//! Recall - file-backed memoization
//!
//! Maps a function identity plus its arguments to a previously computed
//! result, persisted on disk so expensive computations survive restarts.
//!
//! ```rust,ignore
//! use recall::{CallEntry, CallRecord, Matrix, Memo};
//!
//! let memo = Memo::open("cache");
//! let record = CallRecord::single(CallEntry::new("ones").arg(3).arg(3));
//! let value = memo.compute_or_fetch(record, "p_", |r| {
//!     let e = r.primary()?;
//!     Ok(Matrix::ones(e.positional_as::<i64>(0)? as usize, e.positional_as::<i64>(1)? as usize))
//! })?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod inventory;
pub mod key;
pub mod memo;
pub mod record;
pub mod reference;
pub mod store;
pub mod ui;
pub mod value;

pub use error::{RecallError, RecallResult};
pub use inventory::{list_entries, InventoryEntry};
pub use key::{CacheKey, KeyDeriver, KeyOptions};
pub use memo::Memo;
pub use record::{CallEntry, CallRecord, CallRecordBuilder};
pub use reference::{resolve_all, LazyRef};
pub use store::{BlobStore, CacheEntry, FileStore};
pub use value::{FromValue, Matrix, Value};
