//! Call records: the captured identity of a cached computation
//!
//! A record is an ordered list of call entries. Records are assembled
//! with [`CallRecordBuilder`] and become immutable once finalized; only
//! finalized records can derive keys or be persisted.

use crate::error::{RecallError, RecallResult};
use crate::value::{FromValue, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;

/// One function invocation: name plus positional and keyword arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEntry {
    name: String,
    args: Vec<Value>,
    /// Keyword arguments in the order they were supplied
    kwargs: Vec<(String, Value)>,
}

impl CallEntry {
    /// Start an entry for the named function with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument
    ///
    /// Re-supplying a keyword replaces its value but keeps its original
    /// position, so the rendered key only depends on first-supply order.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.kwargs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.kwargs.push((key, value)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &[(String, Value)] {
        &self.kwargs
    }

    /// Positional argument at `index`
    pub fn positional(&self, index: usize) -> RecallResult<&Value> {
        self.args.get(index).ok_or_else(|| {
            RecallError::MissingArgument(format!("{}: positional #{}", self.name, index))
        })
    }

    /// Positional argument at `index`, converted to `T`
    pub fn positional_as<T: FromValue>(&self, index: usize) -> RecallResult<T> {
        self.positional(index)?.clone().into_typed()
    }

    /// Keyword argument by name
    pub fn keyword(&self, key: &str) -> Option<&Value> {
        self.kwargs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Keyword argument by name, converted to `T`
    pub fn keyword_as<T: FromValue>(&self, key: &str) -> RecallResult<T> {
        self.keyword(key)
            .cloned()
            .ok_or_else(|| RecallError::MissingArgument(format!("{}: keyword {}", self.name, key)))?
            .into_typed()
    }

    /// Split into name, positional and keyword arguments
    pub fn into_parts(self) -> (String, Vec<Value>, Vec<(String, Value)>) {
        (self.name, self.args, self.kwargs)
    }

    pub(crate) fn from_parts(name: String, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Self {
        Self { name, args, kwargs }
    }

    fn estimated_size(&self) -> usize {
        mem::size_of::<Self>()
            + self.name.capacity()
            + self.args.iter().map(Value::estimated_size).sum::<usize>()
            + self
                .kwargs
                .iter()
                .map(|(k, v)| mem::size_of::<String>() + k.capacity() + v.estimated_size())
                .sum::<usize>()
    }
}

impl fmt::Display for CallEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        if !self.kwargs.is_empty() {
            write!(f, "; ")?;
            for (i, (k, v)) in self.kwargs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", k, v)?;
            }
        }
        write!(f, ")")
    }
}

/// Append-only accumulator for the entries of one record
#[derive(Debug, Default)]
pub struct CallRecordBuilder {
    entries: Vec<CallEntry>,
}

impl CallRecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sub-call whose parameters contribute to the key
    pub fn push(&mut self, entry: CallEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Builder-style variant of [`push`](Self::push)
    pub fn with(mut self, entry: CallEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn finalize(self) -> CallRecord {
        CallRecord {
            entries: self.entries,
        }
    }
}

/// Finalized, immutable call record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    entries: Vec<CallEntry>,
}

impl CallRecord {
    pub fn builder() -> CallRecordBuilder {
        CallRecordBuilder::new()
    }

    /// Record consisting of a single call
    pub fn single(entry: CallEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    pub fn entries(&self) -> &[CallEntry] {
        &self.entries
    }

    /// First entry: the call that owns the computation
    pub fn primary(&self) -> RecallResult<&CallEntry> {
        self.entries
            .first()
            .ok_or_else(|| RecallError::MissingArgument("call record has no entries".to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any argument of any entry is a lazy reference
    pub fn has_refs(&self) -> bool {
        self.entries.iter().any(|e| {
            e.args.iter().any(Value::is_ref) || e.kwargs.iter().any(|(_, v)| v.is_ref())
        })
    }

    /// Approximate in-memory size in bytes
    pub fn estimated_size(&self) -> usize {
        mem::size_of::<Self>()
            + self
                .entries
                .iter()
                .map(CallEntry::estimated_size)
                .sum::<usize>()
    }

    /// Human-readable one-line description for listings
    pub fn summary(&self) -> String {
        self.to_string()
    }

    pub(crate) fn into_entries(self) -> Vec<CallEntry> {
        self.entries
    }

    pub(crate) fn from_entries(entries: Vec<CallEntry>) -> Self {
        Self { entries }
    }
}

impl From<CallEntry> for CallRecord {
    fn from(entry: CallEntry) -> Self {
        Self::single(entry)
    }
}

impl fmt::Display for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}
