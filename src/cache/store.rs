use super::types::{
    CacheConfig, CacheError, CacheFile, SeasonalEntry, CACHE_VERSION, RECENT_FILES_MAX,
};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info, warn};

/// Persistent store for seasonal metadata, recent files and server lookups
pub struct CacheStore {
    config: CacheConfig,
    data: CacheFile,
    dirty: bool,
}

impl CacheStore {
    /// Load cache from disk or create a new empty one
    pub fn load(config: CacheConfig) -> Self {
        let data = match Self::read_cache_file(&config.cache_path) {
            Ok(cache) => {
                info!(
                    "Loaded cache with {} seasonal entries",
                    cache.seasonal.len()
                );
                cache
            }
            Err(e) => {
                match &e {
                    CacheError::IoError(io_err)
                        if io_err.kind() == std::io::ErrorKind::NotFound =>
                    {
                        debug!("No cache file found, starting fresh");
                    }
                    _ => {
                        warn!("Failed to load cache: {}, starting fresh", e);
                    }
                }
                CacheFile::default()
            }
        };

        Self {
            config,
            data,
            dirty: false,
        }
    }

    fn read_cache_file(path: &Path) -> Result<CacheFile, CacheError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let cache: CacheFile =
            serde_json::from_reader(reader).map_err(|_| CacheError::Corrupted)?;

        if cache.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_VERSION.to_string(),
                found: cache.version,
            });
        }

        Ok(cache)
    }

    /// All entries stored for a season label, stale ones included, sorted by title
    pub fn seasonal(&self, season_label: &str) -> Vec<SeasonalEntry> {
        self.data
            .seasonal
            .values()
            .filter(|entry| entry.season == season_label)
            .cloned()
            .collect()
    }

    /// Look up a single title regardless of season
    pub fn seasonal_entry(&self, title: &str) -> Option<&SeasonalEntry> {
        self.data.seasonal.get(title)
    }

    /// True when the season has entries and none of them has expired
    pub fn is_season_fresh(&self, season_label: &str) -> bool {
        let mut entries = self
            .data
            .seasonal
            .values()
            .filter(|entry| entry.season == season_label)
            .peekable();

        if entries.peek().is_none() {
            debug!(season = %season_label, "No cached seasonal entries");
            return false;
        }

        let expiry_days = self.config.expiry_days;
        let fresh = entries.all(|entry| !entry.is_expired(expiry_days));
        if !fresh {
            debug!(season = %season_label, "Cached seasonal entries expired");
        }
        fresh
    }

    /// Insert or overwrite entries, keyed by title
    pub fn upsert_seasonal(&mut self, entries: impl IntoIterator<Item = SeasonalEntry>) {
        let mut count = 0usize;
        for entry in entries {
            self.data.seasonal.insert(entry.title.clone(), entry);
            count += 1;
        }
        if count > 0 {
            debug!("Cached {} seasonal entries", count);
            self.dirty = true;
        }
    }

    /// Number of seasonal entries
    pub fn len(&self) -> usize {
        self.data.seasonal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.seasonal.is_empty()
    }

    /// Recently imported or exported files, most recent first
    pub fn recent_files(&self) -> &[String] {
        &self.data.recent_files
    }

    /// Move `path` to the front of the recent files list
    pub fn push_recent(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let entry = fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .into_owned();

        self.data.recent_files.retain(|existing| existing != &entry);
        self.data.recent_files.insert(0, entry);
        self.data.recent_files.truncate(RECENT_FILES_MAX);
        self.dirty = true;
    }

    pub fn clear_recent(&mut self) {
        if !self.data.recent_files.is_empty() {
            self.data.recent_files.clear();
            self.dirty = true;
        }
    }

    /// Category name to save path, as last fetched from the server
    pub fn categories(&self) -> &BTreeMap<String, String> {
        &self.data.categories
    }

    pub fn set_categories(&mut self, categories: BTreeMap<String, String>) {
        self.data.categories = categories;
        self.dirty = true;
    }

    /// Feed path to feed URL, as last fetched from the server
    pub fn feeds(&self) -> &BTreeMap<String, String> {
        &self.data.feeds
    }

    pub fn set_feeds(&mut self, feeds: BTreeMap<String, String>) {
        self.data.feeds = feeds;
        self.dirty = true;
    }

    /// Save cache to disk if modified
    pub fn save(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            debug!("Cache not modified, skipping save");
            return Ok(());
        }

        if let Some(parent) = self.config.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config.cache_path.with_extension("json.tmp");
        {
            let file = File::create(&temp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &self.data)?;
        }
        fs::rename(&temp_path, &self.config.cache_path)?;

        self.dirty = false;
        info!(
            "Saved cache with {} seasonal entries to {:?}",
            self.data.seasonal.len(),
            self.config.cache_path
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config.cache_path
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        if let Err(e) = self.save() {
            warn!("Failed to save cache on drop: {}", e);
        }
    }
}
