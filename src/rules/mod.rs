//! RSS auto-download rules: generation, wire format, validation and matching

pub mod io;
mod pattern;
mod set;
mod types;

pub use pattern::title_to_regex;
pub use set::{normalize_rule_name, DuplicatePolicy, InsertOutcome, RuleSet};
pub use types::{RssRule, RuleIssue, RuleTemplate, USE_GLOBAL_LIMIT};

use crate::pathgen::{
    build_save_path, normalize_title, validate_save_path, FilesystemMode, NormalizedTitle,
};
use crate::season::SeasonContext;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

const TP_CATEGORY: &str = "category";
const TP_SAVE_PATH: &str = "save_path";

impl RssRule {
    /// Generate a rule for `title` using the template's defaults.
    ///
    /// Returns the normalized folder name alongside so callers can surface
    /// sanitization changes and invalid names as warnings.
    pub fn from_title(
        title: &str,
        season: Option<&SeasonContext>,
        template: &RuleTemplate,
    ) -> (RssRule, NormalizedTitle) {
        let display = title.split_whitespace().collect::<Vec<_>>().join(" ");
        let folder = normalize_title(&display, template.filesystem_mode, template.auto_sanitize);

        let name = match season {
            Some(ctx) if template.prefix_season => format!("{} - {}", ctx.label(), display),
            _ => display.clone(),
        };

        let must_contain = if template.use_regex {
            title_to_regex(
                &display,
                template.flexible_whitespace,
                template.flexible_punctuation,
            )
        } else {
            folder.folder_name.clone()
        };

        let save_path = build_save_path(&template.save_path_base, season, &folder.folder_name);

        let mut torrent_params = serde_json::Map::new();
        torrent_params.insert(TP_CATEGORY.into(), json!(template.category));
        torrent_params.insert(TP_SAVE_PATH.into(), json!(save_path));
        torrent_params.insert("operating_mode".into(), json!("AutoManaged"));
        torrent_params.insert("ratio_limit".into(), json!(USE_GLOBAL_LIMIT));
        torrent_params.insert("seeding_time_limit".into(), json!(USE_GLOBAL_LIMIT));

        debug!(name = %name, save_path = %save_path, "Generated rule");

        let rule = RssRule {
            name,
            enabled: template.enabled,
            must_contain,
            must_not_contain: template.must_not_contain.clone(),
            use_regex: template.use_regex,
            affected_feeds: template.feeds.clone(),
            add_paused: template.add_paused,
            assigned_category: template.category.clone(),
            save_path,
            torrent_params,
            ..Default::default()
        };

        (rule, folder)
    }

    /// Wire object as qBittorrent expects it in `ruleDef`
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    /// Inverse of [`to_wire`](Self::to_wire)
    pub fn from_wire(name: &str, value: Value) -> Result<Self, serde_json::Error> {
        let mut rule: RssRule = serde_json::from_value(value)?;
        rule.name = name.to_string();
        Ok(rule)
    }

    /// Change the category, keeping `torrentParams.category` in step
    pub fn set_category(&mut self, category: &str) {
        self.assigned_category = category.to_string();
        if self.torrent_params.contains_key(TP_CATEGORY) {
            self.torrent_params
                .insert(TP_CATEGORY.into(), json!(category));
        }
    }

    /// Change the save path, keeping `torrentParams.save_path` in step
    pub fn set_save_path(&mut self, path: &str) {
        self.save_path = path.to_string();
        if self.torrent_params.contains_key(TP_SAVE_PATH) {
            self.torrent_params.insert(TP_SAVE_PATH.into(), json!(path));
        }
    }

    pub fn validate(&self, mode: FilesystemMode) -> Vec<RuleIssue> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(RuleIssue::EmptyName);
        }

        if self.must_contain.trim().is_empty() {
            issues.push(RuleIssue::EmptyPattern);
        }

        if let Err(e) = validate_save_path(&self.save_path, mode) {
            issues.push(RuleIssue::InvalidSavePath(e));
        }

        if self.use_regex {
            for (field, expr) in [
                ("mustContain", &self.must_contain),
                ("mustNotContain", &self.must_not_contain),
            ] {
                if expr.trim().is_empty() {
                    continue;
                }
                if let Err(e) = pattern::compile(expr) {
                    if pattern::uses_lookaround(expr) {
                        issues.push(RuleIssue::UnsupportedRegex { field });
                    } else {
                        issues.push(RuleIssue::InvalidRegex {
                            field,
                            error: e.to_string(),
                        });
                    }
                }
            }
        } else if let Some(term) = self.contradicting_term() {
            issues.push(RuleIssue::Contradictory { term });
        }

        if self.affected_feeds.is_empty() {
            issues.push(RuleIssue::NoFeeds);
        }
        for feed in &self.affected_feeds {
            let usable = Url::parse(feed)
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !usable {
                issues.push(RuleIssue::InvalidFeedUrl { url: feed.clone() });
            }
        }

        issues
    }

    /// An excluded term present in every must-contain alternative, if any
    fn contradicting_term(&self) -> Option<String> {
        let excluded: Vec<String> = pattern::alternatives(&self.must_not_contain)
            .map(str::to_lowercase)
            .collect();
        if excluded.is_empty() {
            return None;
        }

        let mut alts = pattern::alternatives(&self.must_contain)
            .map(str::to_lowercase)
            .peekable();
        alts.peek()?;

        let mut found: Option<String> = None;
        for alt in alts {
            let term = excluded.iter().find(|term| alt.contains(term.as_str()))?;
            found.get_or_insert_with(|| term.clone());
        }
        found
    }

    /// Whether qBittorrent would download a feed item with this title
    pub fn matches(&self, item_title: &str) -> bool {
        if self.use_regex {
            if self.must_contain.trim().is_empty() {
                return false;
            }
            pattern::matches_regex_expression(&self.must_contain, item_title)
                && (self.must_not_contain.trim().is_empty()
                    || !pattern::matches_regex_expression(&self.must_not_contain, item_title))
        } else {
            pattern::matches_wildcard_expression(&self.must_contain, item_title)
                && (pattern::alternatives(&self.must_not_contain).next().is_none()
                    || !pattern::matches_wildcard_expression(&self.must_not_contain, item_title))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathgen::FolderNameError;
    use crate::season::Season;

    fn template() -> RuleTemplate {
        RuleTemplate {
            save_path_base: "/data/anime".to_string(),
            category: "Anime".to_string(),
            feeds: vec!["https://subsplease.org/rss/?r=1080".to_string()],
            add_paused: Some(false),
            must_not_contain: "720p".to_string(),
            enabled: true,
            use_regex: false,
            flexible_whitespace: true,
            flexible_punctuation: true,
            prefix_season: false,
            filesystem_mode: FilesystemMode::Windows,
            auto_sanitize: true,
        }
    }

    #[test]
    fn test_from_title_applies_defaults() {
        let ctx = SeasonContext::new(Season::Fall, 2025);
        let (rule, folder) = RssRule::from_title("Frieren:  Beyond Journey's End", Some(&ctx), &template());

        assert_eq!(rule.name, "Frieren: Beyond Journey's End");
        assert_eq!(folder.folder_name, "Frieren - Beyond Journey's End");
        assert!(folder.changed);
        assert_eq!(rule.must_contain, "Frieren - Beyond Journey's End");
        assert_eq!(rule.must_not_contain, "720p");
        assert_eq!(
            rule.save_path,
            "/data/anime/Fall 2025/Frieren - Beyond Journey's End"
        );
        assert_eq!(rule.assigned_category, "Anime");
        assert_eq!(rule.add_paused, Some(false));
        assert_eq!(rule.affected_feeds.len(), 1);
        assert_eq!(rule.torrent_params["category"], "Anime");
        assert_eq!(rule.torrent_params["save_path"], json!(rule.save_path));
        assert_eq!(rule.torrent_params["ratio_limit"], -2);
    }

    #[test]
    fn test_from_title_season_prefix() {
        let ctx = SeasonContext::new(Season::Winter, 2026);
        let mut template = template();
        template.prefix_season = true;

        let (rule, _) = RssRule::from_title("Dandadan", Some(&ctx), &template);
        assert_eq!(rule.name, "Winter 2026 - Dandadan");

        let (rule, _) = RssRule::from_title("Dandadan", None, &template);
        assert_eq!(rule.name, "Dandadan");
        assert_eq!(rule.save_path, "/data/anime/Dandadan");
    }

    #[test]
    fn test_from_title_regex_mode() {
        let mut template = template();
        template.use_regex = true;

        let (rule, _) = RssRule::from_title("Spy x Family", None, &template);
        assert!(rule.use_regex);
        assert_eq!(rule.must_contain, r"Spy[\s._-]+x[\s._-]+Family");
        assert!(rule.matches("[SubsPlease] Spy.x.Family - 12 (1080p)"));
        assert!(!rule.matches("[SubsPlease] Spy.x.Family - 12 (720p)"));
    }

    #[test]
    fn test_wire_round_trip() {
        let ctx = SeasonContext::new(Season::Spring, 2025);
        let (rule, _) = RssRule::from_title("The Apothecary Diaries", Some(&ctx), &template());

        let back = RssRule::from_wire(&rule.name, rule.to_wire()).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_wire_fields() {
        let (rule, _) = RssRule::from_title("Frieren", None, &template());
        let wire = rule.to_wire();

        assert!(wire.get("name").is_none());
        assert_eq!(wire["mustContain"], "Frieren");
        assert_eq!(wire["useRegex"], false);
        assert_eq!(wire["addPaused"], false);
        assert_eq!(wire["assignedCategory"], "Anime");
        assert!(wire["torrentContentLayout"].is_null());
    }

    #[test]
    fn test_unknown_wire_fields_preserved() {
        let value = json!({
            "enabled": true,
            "mustContain": "Frieren",
            "futureServerField": {"nested": [1, 2]},
        });

        let rule = RssRule::from_wire("Frieren", value).unwrap();
        assert_eq!(rule.extra["futureServerField"]["nested"][1], 2);
        assert_eq!(rule.to_wire()["futureServerField"], json!({"nested": [1, 2]}));
    }

    #[test]
    fn test_setters_sync_torrent_params() {
        let (mut rule, _) = RssRule::from_title("Frieren", None, &template());
        rule.set_category("Seasonal");
        rule.set_save_path("/mnt/media/Frieren");

        assert_eq!(rule.assigned_category, "Seasonal");
        assert_eq!(rule.torrent_params["category"], "Seasonal");
        assert_eq!(rule.torrent_params["save_path"], "/mnt/media/Frieren");

        // Keys missing from torrentParams are not invented
        let mut bare = RssRule::default();
        bare.set_category("Seasonal");
        assert!(bare.torrent_params.is_empty());
    }

    #[test]
    fn test_validate_clean_rule() {
        let (rule, _) = RssRule::from_title("Frieren", None, &template());
        assert!(rule.validate(FilesystemMode::Windows).is_empty());
    }

    #[test]
    fn test_validate_reports_problems() {
        let rule = RssRule {
            name: String::new(),
            must_contain: String::new(),
            save_path: "/data/../etc".to_string(),
            ..Default::default()
        };

        let issues = rule.validate(FilesystemMode::Posix);
        assert!(issues.contains(&RuleIssue::EmptyName));
        assert!(issues.contains(&RuleIssue::EmptyPattern));
        assert!(issues.contains(&RuleIssue::InvalidSavePath(FolderNameError::PathTraversal)));
        assert!(issues.contains(&RuleIssue::NoFeeds));
    }

    #[test]
    fn test_validate_contradictory_patterns() {
        let rule = RssRule {
            name: "Show".to_string(),
            must_contain: "Show 1080p | Show HEVC 1080p".to_string(),
            must_not_contain: "1080p".to_string(),
            affected_feeds: vec!["https://example.org/rss".to_string()],
            ..Default::default()
        };
        assert_eq!(
            rule.validate(FilesystemMode::Posix),
            vec![RuleIssue::Contradictory {
                term: "1080p".to_string()
            }]
        );

        // One alternative escapes the exclusion
        let rule = RssRule {
            must_contain: "Show 1080p | Show 720p".to_string(),
            ..rule
        };
        assert!(rule.validate(FilesystemMode::Posix).is_empty());
    }

    #[test]
    fn test_validate_invalid_regex() {
        let rule = RssRule {
            name: "Broken".to_string(),
            must_contain: "(unclosed".to_string(),
            use_regex: true,
            affected_feeds: vec!["https://example.org/rss".to_string()],
            ..Default::default()
        };
        let issues = rule.validate(FilesystemMode::Posix);
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues[0],
            RuleIssue::InvalidRegex {
                field: "mustContain",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_lookaround_is_warning() {
        let rule = RssRule {
            name: "Frieren".to_string(),
            must_contain: "Frieren(?!.*480p)".to_string(),
            use_regex: true,
            affected_feeds: vec!["https://example.org/rss".to_string()],
            ..Default::default()
        };
        let issues = rule.validate(FilesystemMode::Posix);
        assert_eq!(
            issues,
            vec![RuleIssue::UnsupportedRegex {
                field: "mustContain"
            }]
        );
        assert!(!issues[0].is_error());
    }

    #[test]
    fn test_validate_feed_urls() {
        let rule = RssRule {
            name: "Frieren".to_string(),
            must_contain: "Frieren".to_string(),
            affected_feeds: vec![
                "https://subsplease.org/rss/?r=1080".to_string(),
                "ftp://example.org/feed".to_string(),
                "not a url".to_string(),
            ],
            ..Default::default()
        };
        let issues = rule.validate(FilesystemMode::Posix);
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .all(|i| matches!(i, RuleIssue::InvalidFeedUrl { .. }) && !i.is_error()));
    }

    #[test]
    fn test_matches_exact_mode() {
        let rule = RssRule {
            name: "Frieren".to_string(),
            must_contain: "Frieren".to_string(),
            must_not_contain: "720p|480p".to_string(),
            ..Default::default()
        };

        assert!(rule.matches("[SubsPlease] Sousou no Frieren - 28 (1080p) [ABCD].mkv"));
        assert!(!rule.matches("[SubsPlease] Sousou no Frieren - 28 (720p) [ABCD].mkv"));
        assert!(!rule.matches("[SubsPlease] Dandadan - 01 (1080p)"));
    }
}
