use crate::config::AppConfig;
use crate::pathgen::{FilesystemMode, FolderNameError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// qBittorrent value meaning "use the global limit"
pub const USE_GLOBAL_LIMIT: i64 = -2;

/// One RSS auto-download rule, as qBittorrent stores it.
///
/// The rule name is the map key on the server and is not part of the wire
/// object. Fields the server sends that are not modelled here are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RssRule {
    #[serde(skip)]
    pub name: String,
    pub enabled: bool,
    pub must_contain: String,
    pub must_not_contain: String,
    pub use_regex: bool,
    pub episode_filter: String,
    pub smart_filter: bool,
    pub previously_matched_episodes: Vec<String>,
    pub affected_feeds: Vec<String>,
    pub ignore_days: i64,
    pub last_match: String,
    pub add_paused: Option<bool>,
    pub assigned_category: String,
    pub save_path: String,
    pub priority: i64,
    pub torrent_content_layout: Option<String>,
    pub torrent_params: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RssRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            must_contain: String::new(),
            must_not_contain: String::new(),
            use_regex: false,
            episode_filter: String::new(),
            smart_filter: false,
            previously_matched_episodes: Vec::new(),
            affected_feeds: Vec::new(),
            ignore_days: 0,
            last_match: String::new(),
            add_paused: None,
            assigned_category: String::new(),
            save_path: String::new(),
            priority: 0,
            torrent_content_layout: None,
            torrent_params: Map::new(),
            extra: Map::new(),
        }
    }
}

/// Settings applied to every rule generated from a title
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTemplate {
    pub save_path_base: String,
    pub category: String,
    pub feeds: Vec<String>,
    pub add_paused: Option<bool>,
    pub must_not_contain: String,
    pub enabled: bool,
    pub use_regex: bool,
    pub flexible_whitespace: bool,
    pub flexible_punctuation: bool,
    pub prefix_season: bool,
    pub filesystem_mode: FilesystemMode,
    pub auto_sanitize: bool,
}

impl Default for RuleTemplate {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl RuleTemplate {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            save_path_base: config.rules.save_path.clone(),
            category: config.rules.category.clone(),
            feeds: config.rules.feeds.clone(),
            add_paused: config.rules.add_paused,
            must_not_contain: config.rules.must_not_contain.clone(),
            enabled: true,
            use_regex: config.rules.use_regex,
            flexible_whitespace: config.rules.flexible_whitespace,
            flexible_punctuation: config.rules.flexible_punctuation,
            prefix_season: config.rules.prefix_season,
            filesystem_mode: config.ui.filesystem_mode,
            auto_sanitize: config.ui.auto_sanitize,
        }
    }
}

/// A problem found by [`RssRule::validate`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleIssue {
    #[error("Rule name is empty")]
    EmptyName,

    #[error("Must-contain pattern is empty")]
    EmptyPattern,

    #[error("Invalid save path: {0}")]
    InvalidSavePath(FolderNameError),

    #[error("Every must-contain alternative also contains excluded term '{term}'")]
    Contradictory { term: String },

    #[error("Invalid regular expression in {field}: {error}")]
    InvalidRegex { field: &'static str, error: String },

    #[error("{field} uses lookaround, which only qBittorrent can evaluate")]
    UnsupportedRegex { field: &'static str },

    #[error("Affected feed '{url}' is not an http(s) URL")]
    InvalidFeedUrl { url: String },

    #[error("Rule has no affected feeds and will never match")]
    NoFeeds,
}

impl RuleIssue {
    /// Warnings are reported but do not block export or upload
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            RuleIssue::NoFeeds | RuleIssue::UnsupportedRegex { .. } | RuleIssue::InvalidFeedUrl { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_is_enabled() {
        let rule = RssRule::default();
        assert!(rule.enabled);
        assert!(rule.add_paused.is_none());
    }

    #[test]
    fn test_template_from_config() {
        let mut config = AppConfig::default();
        config.rules.category = "Anime".to_string();
        config.rules.add_paused = Some(true);

        let template = RuleTemplate::from_config(&config);
        assert_eq!(template.category, "Anime");
        assert_eq!(template.add_paused, Some(true));
        assert!(template.enabled);
    }

    #[test]
    fn test_issue_severity() {
        assert!(RuleIssue::EmptyName.is_error());
        assert!(!RuleIssue::NoFeeds.is_error());
    }
}
