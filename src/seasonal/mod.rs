//! Seasonal title lookup backed by the release schedule and the local cache

mod client;
mod types;

pub use client::{parse_schedule, ScheduleSource, SubsPleaseClient};
pub use types::{ScheduledShow, SeasonalError, SeasonalTitles};

use crate::cache::{CacheStore, SeasonalEntry};
use crate::season::SeasonContext;
use tracing::{debug, info, warn};

/// Serves seasonal titles from the cache, refreshing from `source` when needed
pub struct SeasonalFetcher<'a, S: ScheduleSource> {
    source: S,
    cache: &'a mut CacheStore,
}

impl<'a, S: ScheduleSource> SeasonalFetcher<'a, S> {
    pub fn new(source: S, cache: &'a mut CacheStore) -> Self {
        Self { source, cache }
    }

    /// Titles for `season`.
    ///
    /// A fresh cache is used as-is unless `force_refresh`. Otherwise the
    /// schedule is fetched once and merged into the cache. When the fetch
    /// fails, whatever the cache holds for the season is returned marked
    /// stale; with nothing cached the fetch error is returned.
    pub fn get_titles(
        &mut self,
        season: &SeasonContext,
        force_refresh: bool,
    ) -> Result<SeasonalTitles, SeasonalError> {
        let label = season.label();

        if !force_refresh && self.cache.is_season_fresh(&label) {
            let entries = self.cache.seasonal(&label);
            info!(season = %label, count = entries.len(), "Using cached seasonal titles");
            return Ok(SeasonalTitles {
                season: *season,
                entries,
                from_cache: true,
                stale: false,
            });
        }

        match self.source.fetch_schedule() {
            Ok(shows) => {
                let fetched = shows.len();
                self.cache
                    .upsert_seasonal(shows.into_iter().map(|show| show.into_entry(season)));
                if let Err(e) = self.cache.save() {
                    warn!("Failed to save cache: {}", e);
                }

                let entries = self.cache.seasonal(&label);
                info!(season = %label, fetched, total = entries.len(), "Fetched seasonal titles");
                Ok(SeasonalTitles {
                    season: *season,
                    entries,
                    from_cache: false,
                    stale: false,
                })
            }
            Err(e) => {
                let entries = self.cache.seasonal(&label);
                if entries.is_empty() {
                    return Err(SeasonalError::Unavailable {
                        season: label,
                        reason: e.to_string(),
                    });
                }

                warn!(
                    season = %label,
                    "Schedule fetch failed ({}), using {} cached titles that may be out of date",
                    e,
                    entries.len()
                );
                Ok(SeasonalTitles {
                    season: *season,
                    entries,
                    from_cache: true,
                    stale: true,
                })
            }
        }
    }
}

/// Lowercase, punctuation to spaces, whitespace collapsed
pub fn normalize_for_match(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Best entry for `query`: an exact normalized match, otherwise the entry whose
/// normalized title contains (or is contained in) the query with the longest
/// overlap.
pub fn find_match<'e>(query: &str, entries: &'e [SeasonalEntry]) -> Option<&'e SeasonalEntry> {
    let needle = normalize_for_match(query);
    if needle.is_empty() {
        return None;
    }

    let mut best: Option<(&SeasonalEntry, usize)> = None;
    for entry in entries {
        let candidate = normalize_for_match(&entry.title);
        if candidate.is_empty() {
            continue;
        }
        if candidate == needle {
            debug!(query = %query, matched = %entry.title, "Exact seasonal match");
            return Some(entry);
        }
        if candidate.contains(&needle) || needle.contains(&candidate) {
            let overlap = candidate.len().min(needle.len());
            if best.map_or(true, |(_, score)| overlap > score) {
                best = Some((entry, overlap));
            }
        }
    }

    best.map(|(entry, _)| entry)
}
