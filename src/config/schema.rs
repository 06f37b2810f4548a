//! Configuration schema for Recall
//!
//! Configuration is stored at `~/.config/recall/config.toml`

use crate::key::{KeyOptions, DEFAULT_MAX_KEY_LEN};
use crate::memo::DEFAULT_WARN_RECORD_BYTES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cache entries
    pub dir: PathBuf,

    /// Longest literal key rendering before falling back to a digest
    pub max_key_len: usize,

    /// Always keep literal keys, never hash
    pub full_keys: bool,

    /// Warn when a call record exceeds this many bytes (default: 2000)
    pub warn_record_bytes: usize,
}

impl CacheConfig {
    /// Default cache directory
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recall")
    }

    /// Key derivation settings from this section
    pub fn key_options(&self) -> KeyOptions {
        KeyOptions {
            max_len: self.max_key_len,
            full: self.full_keys,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            max_key_len: DEFAULT_MAX_KEY_LEN,
            full_keys: false,
            warn_record_bytes: DEFAULT_WARN_RECORD_BYTES,
        }
    }
}
