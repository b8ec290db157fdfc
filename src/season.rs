use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Anime broadcast season (quarter of the year)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            1..=3 => Season::Winter,
            4..=6 => Season::Spring,
            7..=9 => Season::Summer,
            _ => Season::Fall,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown season: {0} (expected winter, spring, summer or fall)")]
pub struct ParseSeasonError(pub String);

impl FromStr for Season {
    type Err = ParseSeasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "fall" | "autumn" => Ok(Season::Fall),
            _ => Err(ParseSeasonError(s.to_string())),
        }
    }
}

/// A season together with its year, e.g. "Fall 2025"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeasonContext {
    pub season: Season,
    pub year: i32,
}

impl SeasonContext {
    pub fn new(season: Season, year: i32) -> Self {
        Self { season, year }
    }

    /// Season containing today's local date
    pub fn current() -> Self {
        let now = Local::now();
        Self {
            season: Season::from_month(now.month()),
            year: now.year(),
        }
    }

    /// Resolve optional CLI values, filling gaps from the current season
    pub fn resolve(season: Option<Season>, year: Option<i32>) -> Self {
        let current = Self::current();
        Self {
            season: season.unwrap_or(current.season),
            year: year.unwrap_or(current.year),
        }
    }

    /// Label used for save-path segments, rule-name prefixes and cache keys
    pub fn label(&self) -> String {
        format!("{} {}", self.season, self.year)
    }
}

impl fmt::Display for SeasonContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_from_month() {
        assert_eq!(Season::from_month(1), Season::Winter);
        assert_eq!(Season::from_month(3), Season::Winter);
        assert_eq!(Season::from_month(4), Season::Spring);
        assert_eq!(Season::from_month(8), Season::Summer);
        assert_eq!(Season::from_month(10), Season::Fall);
        assert_eq!(Season::from_month(12), Season::Fall);
    }

    #[test]
    fn test_season_parse() {
        assert_eq!("Winter".parse::<Season>(), Ok(Season::Winter));
        assert_eq!(" spring ".parse::<Season>(), Ok(Season::Spring));
        assert_eq!("AUTUMN".parse::<Season>(), Ok(Season::Fall));
        assert!("monsoon".parse::<Season>().is_err());
    }

    #[test]
    fn test_context_label() {
        let ctx = SeasonContext::new(Season::Fall, 2025);
        assert_eq!(ctx.label(), "Fall 2025");
        assert_eq!(ctx.to_string(), "Fall 2025");
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let ctx = SeasonContext::resolve(Some(Season::Summer), Some(2019));
        assert_eq!(ctx, SeasonContext::new(Season::Summer, 2019));
    }
}
