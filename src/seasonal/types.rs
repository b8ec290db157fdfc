use crate::cache::SeasonalEntry;
use crate::season::SeasonContext;
use thiserror::Error;

/// One show from a release schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledShow {
    pub title: String,
    pub page_url: Option<String>,
    pub image_url: Option<String>,
    pub air_day: Option<String>,
    pub air_time: Option<String>,
    pub aired: Option<bool>,
}

impl ScheduledShow {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            page_url: None,
            image_url: None,
            air_day: None,
            air_time: None,
            aired: None,
        }
    }

    /// Cache record for this show, labeled with `season`
    pub fn into_entry(self, season: &SeasonContext) -> SeasonalEntry {
        let mut entry = SeasonalEntry::new(self.title, season.label());
        entry.page_url = self.page_url;
        entry.image_url = self.image_url;
        entry.air_day = self.air_day;
        entry.air_time = self.air_time;
        entry.status = self.aired.map(|aired| {
            if aired {
                "aired today".to_string()
            } else {
                "airing".to_string()
            }
        });
        entry
    }
}

/// Titles for one season and where they came from
#[derive(Debug, Clone)]
pub struct SeasonalTitles {
    pub season: SeasonContext,
    /// Sorted by title
    pub entries: Vec<SeasonalEntry>,
    pub from_cache: bool,
    /// Served from an expired cache because the fetch failed
    pub stale: bool,
}

impl SeasonalTitles {
    pub fn titles(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.title.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors that can occur while fetching seasonal data
#[derive(Error, Debug)]
pub enum SeasonalError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Schedule API returned HTTP {0}")]
    Status(u16),

    #[error("Invalid schedule response: {0}")]
    InvalidResponse(String),

    #[error("Schedule contained no titles")]
    NoTitles,

    #[error("No seasonal data available for {season}: {reason}")]
    Unavailable { season: String, reason: String },
}

impl From<reqwest::Error> for SeasonalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SeasonalError::Timeout
        } else if err.is_decode() {
            SeasonalError::InvalidResponse(err.to_string())
        } else {
            SeasonalError::Network(err.to_string())
        }
    }
}
