mod store;
mod types;

pub use store::CacheStore;
pub use types::{
    CacheConfig, CacheError, CacheFile, SeasonalEntry, CACHE_VERSION, DEFAULT_EXPIRY_DAYS,
    RECENT_FILES_MAX,
};
