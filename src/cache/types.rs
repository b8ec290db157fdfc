use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CACHE_VERSION: &str = "1.0";

/// Seasonal entries older than this many days are re-fetched
pub const DEFAULT_EXPIRY_DAYS: u32 = 30;

/// Length of the recently-used files list
pub const RECENT_FILES_MAX: usize = 10;

/// Schedule metadata for one title, keyed by title in the cache file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalEntry {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    /// Season label the entry was fetched for, e.g. "Fall 2025"
    pub season: String,
    pub fetched_at: DateTime<Utc>,
}

impl SeasonalEntry {
    pub fn new(title: impl Into<String>, season: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            page_url: None,
            image_url: None,
            air_day: None,
            air_time: None,
            status: None,
            episodes: None,
            synopsis: None,
            season: season.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, expiry_days: u32) -> bool {
        now.signed_duration_since(self.fetched_at) > Duration::days(expiry_days as i64)
    }

    pub fn is_expired(&self, expiry_days: u32) -> bool {
        self.is_expired_at(Utc::now(), expiry_days)
    }
}

/// The cache file structure (serialized to JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub version: String,
    #[serde(default)]
    pub seasonal: BTreeMap<String, SeasonalEntry>,
    #[serde(default)]
    pub recent_files: Vec<String>,
    /// Category name to save path, as last seen on the server
    #[serde(default)]
    pub categories: BTreeMap<String, String>,
    /// Feed path to feed URL, as last seen on the server
    #[serde(default)]
    pub feeds: BTreeMap<String, String>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            seasonal: BTreeMap::new(),
            recent_files: Vec::new(),
            categories: BTreeMap::new(),
            feeds: BTreeMap::new(),
        }
    }
}

/// Configuration for the cache store
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub expiry_days: u32,
    pub cache_path: PathBuf,
}

impl CacheConfig {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            expiry_days: DEFAULT_EXPIRY_DAYS,
            cache_path: path.as_ref().to_path_buf(),
        }
    }

    /// Cache file under the user's cache directory
    pub fn for_user() -> Option<Self> {
        dirs::cache_dir().map(|cache_dir| Self::at(cache_dir.join("titles2qbt").join("cache.json")))
    }
}

/// Errors that can occur during cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache file corrupted")]
    Corrupted,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    #[error("Cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
}
