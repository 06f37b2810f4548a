//! Error types for Recall
//!
//! All modules use `RecallResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Recall operations
pub type RecallResult<T> = Result<T, RecallError>;

/// All errors that can occur in Recall
#[derive(Error, Debug)]
pub enum RecallError {
    // Cache protocol errors
    #[error("Cache key collision at {key}: stored call record differs from the requested one")]
    Collision { key: String },

    #[error("Refusing to overwrite existing cache entry {key}")]
    Overwrite { key: String },

    #[error("Lazy reference points to a missing cache entry: {key}")]
    DanglingReference { key: String },

    #[error("Cache entry not found: {0}")]
    EntryNotFound(String),

    // Value errors
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Unsupported cache entry format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl RecallError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Whether the error means the on-disk cache is inconsistent with the caller
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::Collision { .. } | Self::Overwrite { .. } | Self::DanglingReference { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Collision { .. } => {
                Some("Two different calls share this key. Use full keys or delete the entry")
            }
            Self::Overwrite { .. } => Some("Check presence before storing, or delete the entry"),
            Self::DanglingReference { .. } => {
                Some("The referenced entry was deleted. Recompute the producing call")
            }
            Self::ConfigInvalid { .. } => Some("Run: recall config init --force"),
            _ => None,
        }
    }
}
