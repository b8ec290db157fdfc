//! Session context: the rules being built plus per-rule tracking metadata

use crate::pathgen::{build_save_path, sanitize_folder_name, FilesystemMode};
use crate::rules::{DuplicatePolicy, InsertOutcome, RssRule, RuleSet, RuleTemplate};
use crate::season::SeasonContext;
use crate::validator::TitleFields;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A title as it arrived from a source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleEntry {
    /// Title used for the rule name and folder
    pub display_title: String,
    /// Title exactly as the source spelled it
    pub source_title: String,
    /// External identifier, e.g. a MyAnimeList id
    pub source_id: Option<String>,
    pub page_url: Option<String>,
    pub image_url: Option<String>,
}

impl TitleEntry {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            display_title: title.trim().to_string(),
            source_title: title,
            ..Default::default()
        }
    }
}

impl From<TitleFields> for TitleEntry {
    fn from(fields: TitleFields) -> Self {
        Self {
            display_title: fields.title.clone(),
            source_title: fields.title,
            source_id: fields.source_id,
            page_url: fields.url,
            image_url: fields.image,
        }
    }
}

/// Tracking record for a generated rule, kept apart from the wire rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleMetadata {
    pub display_title: String,
    pub source_title: String,
    pub source_id: Option<String>,
    pub page_url: Option<String>,
    pub image_url: Option<String>,
    pub folder_name: String,
    pub season: Option<SeasonContext>,
    /// The folder name differs from the title because it was sanitized
    pub sanitized: bool,
    pub added_at: DateTime<Utc>,
}

/// Outcome of adding titles or merging rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub skipped: Vec<String>,
    /// (replaced name, new name)
    pub overwritten: Vec<(String, String)>,
    /// (requested name, stored name)
    pub renamed: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl ImportReport {
    /// Rules that ended up in the workspace
    pub fn stored(&self) -> usize {
        self.added.len() + self.overwritten.len() + self.renamed.len()
    }
}

/// Changes applied to many rules at once; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkEdit {
    /// Only rules whose name contains this (case-insensitive)
    pub only: Option<String>,
    pub category: Option<String>,
    /// New base directory; each rule keeps its season and folder segments
    pub save_path_base: Option<String>,
    pub enabled: Option<bool>,
    pub add_paused: Option<Option<bool>>,
    pub feeds: Option<Vec<String>>,
    pub must_not_contain: Option<String>,
}

impl BulkEdit {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.save_path_base.is_none()
            && self.enabled.is_none()
            && self.add_paused.is_none()
            && self.feeds.is_none()
            && self.must_not_contain.is_none()
    }
}

/// Rules under construction together with their tracking metadata
#[derive(Debug, Default)]
pub struct Workspace {
    rules: RuleSet,
    metadata: BTreeMap<String, TitleMetadata>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: RuleSet) -> Self {
        Self {
            rules,
            metadata: BTreeMap::new(),
        }
    }

    /// Generate and insert one rule per title
    pub fn add_titles(
        &mut self,
        titles: &[TitleEntry],
        season: Option<&SeasonContext>,
        template: &RuleTemplate,
        policy: DuplicatePolicy,
    ) -> ImportReport {
        let mut report = ImportReport::default();
        let mut missing_feeds = 0usize;

        for entry in titles {
            if entry.display_title.trim().is_empty() {
                report
                    .warnings
                    .push(format!("Skipped empty title '{}'", entry.source_title));
                continue;
            }

            let (rule, folder) = RssRule::from_title(&entry.display_title, season, template);

            if !folder.is_valid {
                report.warnings.push(format!(
                    "'{}': folder name is not valid for {}: {}",
                    entry.display_title,
                    template.filesystem_mode,
                    folder.error.as_deref().unwrap_or("unknown error")
                ));
            } else if folder.changed {
                report.warnings.push(format!(
                    "'{}': folder name sanitized to '{}'",
                    entry.display_title, folder.folder_name
                ));
            }
            if rule.affected_feeds.is_empty() {
                missing_feeds += 1;
            }

            let metadata = TitleMetadata {
                display_title: entry.display_title.clone(),
                source_title: entry.source_title.clone(),
                source_id: entry.source_id.clone(),
                page_url: entry.page_url.clone(),
                image_url: entry.image_url.clone(),
                folder_name: folder.folder_name.clone(),
                season: season.copied(),
                sanitized: folder.changed,
                added_at: Utc::now(),
            };

            self.insert_rule(rule, Some(metadata), policy, &mut report);
        }

        if missing_feeds > 0 {
            report.warnings.push(format!(
                "{} rule(s) have no affected feeds and will not match until feeds are assigned",
                missing_feeds
            ));
        }

        info!(
            added = report.added.len(),
            skipped = report.skipped.len(),
            renamed = report.renamed.len(),
            "Added titles to workspace"
        );
        report
    }

    /// Insert already-built rules, e.g. from an import file
    pub fn merge_rules(
        &mut self,
        rules: impl IntoIterator<Item = RssRule>,
        policy: DuplicatePolicy,
    ) -> ImportReport {
        let mut report = ImportReport::default();
        for rule in rules {
            self.insert_rule(rule, None, policy, &mut report);
        }
        debug!(stored = report.stored(), "Merged rules into workspace");
        report
    }

    fn insert_rule(
        &mut self,
        rule: RssRule,
        metadata: Option<TitleMetadata>,
        policy: DuplicatePolicy,
        report: &mut ImportReport,
    ) {
        let requested = rule.name.trim().to_string();

        let stored_name = match self.rules.insert(rule, policy) {
            Ok(InsertOutcome::Inserted) => {
                report.added.push(requested.clone());
                requested
            }
            Ok(InsertOutcome::Skipped) => {
                report.skipped.push(requested);
                return;
            }
            Ok(InsertOutcome::Overwritten(old)) => {
                self.metadata.remove(&old);
                report.overwritten.push((old, requested.clone()));
                requested
            }
            Ok(InsertOutcome::Renamed(new_name)) => {
                report.renamed.push((requested, new_name.clone()));
                new_name
            }
            Err(issue) => {
                warn!("Rejected rule: {}", issue);
                report.warnings.push(format!("Rejected rule: {}", issue));
                return;
            }
        };

        match metadata {
            Some(metadata) => {
                self.metadata.insert(stored_name, metadata);
            }
            None => {
                self.metadata.remove(&stored_name);
            }
        }
    }

    /// Apply `edit` to every rule it selects; returns how many were touched
    pub fn bulk_edit(&mut self, edit: &BulkEdit, mode: FilesystemMode) -> usize {
        let filter = edit.only.as_ref().map(|s| s.to_lowercase());
        let mut touched = 0usize;

        for rule in self.rules.iter_mut() {
            if let Some(filter) = &filter {
                if !rule.name.to_lowercase().contains(filter.as_str()) {
                    continue;
                }
            }

            if let Some(category) = &edit.category {
                rule.set_category(category);
            }
            if let Some(base) = &edit.save_path_base {
                let metadata = self.metadata.get(&rule.name);
                let folder = metadata
                    .map(|m| m.folder_name.clone())
                    .unwrap_or_else(|| fallback_folder(rule, mode));
                let season = metadata.and_then(|m| m.season);
                rule.set_save_path(&build_save_path(base, season.as_ref(), &folder));
            }
            if let Some(enabled) = edit.enabled {
                rule.enabled = enabled;
            }
            if let Some(add_paused) = edit.add_paused {
                rule.add_paused = add_paused;
            }
            if let Some(feeds) = &edit.feeds {
                rule.affected_feeds = feeds.clone();
            }
            if let Some(must_not_contain) = &edit.must_not_contain {
                rule.must_not_contain = must_not_contain.clone();
            }
            touched += 1;
        }

        info!(touched, "Bulk edit applied");
        touched
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self.rules.remove(name) {
            Some(rule) => {
                self.metadata.remove(&rule.name);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.rules.clear();
        self.metadata.clear();
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn metadata(&self, name: &str) -> Option<&TitleMetadata> {
        self.metadata.get(name)
    }
}

/// Folder segment for rules without metadata: last save path segment, or the sanitized name
fn fallback_folder(rule: &RssRule, mode: FilesystemMode) -> String {
    rule.save_path
        .rsplit(['/', '\\'])
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| sanitize_folder_name(&rule.name, mode).name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::season::Season;

    fn template() -> RuleTemplate {
        RuleTemplate {
            save_path_base: "/data/anime".to_string(),
            feeds: vec!["https://example.org/rss".to_string()],
            filesystem_mode: FilesystemMode::Windows,
            auto_sanitize: true,
            ..RuleTemplate::default()
        }
    }

    fn titles(names: &[&str]) -> Vec<TitleEntry> {
        names.iter().map(|n| TitleEntry::new(*n)).collect()
    }

    #[test]
    fn test_add_titles_with_metadata() {
        let mut ws = Workspace::new();
        let ctx = SeasonContext::new(Season::Fall, 2025);

        let report = ws.add_titles(
            &titles(&["Frieren", "Re:Zero"]),
            Some(&ctx),
            &template(),
            DuplicatePolicy::Skip,
        );

        assert_eq!(report.added, vec!["Frieren", "Re:Zero"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Re -Zero"));

        let meta = ws.metadata("Re:Zero").unwrap();
        assert_eq!(meta.folder_name, "Re -Zero");
        assert!(meta.sanitized);
        assert_eq!(meta.season, Some(ctx));

        // Metadata never leaks into the wire rule
        let wire = ws.rules().get("Frieren").unwrap().to_wire();
        assert!(wire.get("folder_name").is_none());
        assert!(wire.get("source_title").is_none());
    }

    #[test]
    fn test_duplicate_titles_skipped() {
        let mut ws = Workspace::new();
        let report = ws.add_titles(
            &titles(&["Attack on Titan", "attack on titan "]),
            None,
            &template(),
            DuplicatePolicy::Skip,
        );

        assert_eq!(report.added.len(), 1);
        assert_eq!(report.skipped, vec!["attack on titan"]);
        assert_eq!(ws.rules().len(), 1);
    }

    #[test]
    fn test_missing_title_does_not_abort_batch() {
        let mut ws = Workspace::new();
        let mut entries = titles(&["Frieren", "Dandadan", "Kaiju No. 8"]);
        entries.insert(1, TitleEntry::new("   "));

        let report = ws.add_titles(&entries, None, &template(), DuplicatePolicy::Skip);

        assert_eq!(ws.rules().len(), 3);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("empty title"));
    }

    #[test]
    fn test_merge_rules_rename() {
        let mut ws = Workspace::new();
        ws.add_titles(&titles(&["Frieren"]), None, &template(), DuplicatePolicy::Skip);

        let imported = RssRule {
            name: "frieren".to_string(),
            must_contain: "Frieren".to_string(),
            ..Default::default()
        };
        let report = ws.merge_rules(vec![imported], DuplicatePolicy::Rename);

        assert_eq!(
            report.renamed,
            vec![("frieren".to_string(), "frieren (2)".to_string())]
        );
        assert_eq!(ws.rules().len(), 2);
        assert!(ws.metadata("frieren (2)").is_none());
    }

    #[test]
    fn test_overwrite_drops_stale_metadata() {
        let mut ws = Workspace::new();
        ws.add_titles(&titles(&["Frieren"]), None, &template(), DuplicatePolicy::Skip);

        let replacement = RssRule {
            name: "FRIEREN".to_string(),
            must_contain: "Frieren".to_string(),
            ..Default::default()
        };
        let report = ws.merge_rules(vec![replacement], DuplicatePolicy::Overwrite);

        assert_eq!(
            report.overwritten,
            vec![("Frieren".to_string(), "FRIEREN".to_string())]
        );
        assert!(ws.metadata("Frieren").is_none());
        assert_eq!(ws.rules().len(), 1);
    }

    #[test]
    fn test_bulk_edit_filtered() {
        let mut ws = Workspace::new();
        let ctx = SeasonContext::new(Season::Spring, 2025);
        ws.add_titles(
            &titles(&["Frieren", "Dandadan"]),
            Some(&ctx),
            &template(),
            DuplicatePolicy::Skip,
        );

        let edit = BulkEdit {
            only: Some("dan".to_string()),
            category: Some("Action".to_string()),
            save_path_base: Some("D:\\Media".to_string()),
            enabled: Some(false),
            add_paused: Some(Some(true)),
            ..Default::default()
        };
        assert_eq!(ws.bulk_edit(&edit, FilesystemMode::Windows), 1);

        let rule = ws.rules().get("Dandadan").unwrap();
        assert_eq!(rule.assigned_category, "Action");
        assert_eq!(rule.save_path, "D:/Media/Spring 2025/Dandadan");
        assert_eq!(rule.torrent_params["save_path"], "D:/Media/Spring 2025/Dandadan");
        assert!(!rule.enabled);
        assert_eq!(rule.add_paused, Some(true));

        let untouched = ws.rules().get("Frieren").unwrap();
        assert!(untouched.enabled);
        assert_eq!(untouched.save_path, "/data/anime/Spring 2025/Frieren");
    }

    #[test]
    fn test_bulk_edit_rules_without_metadata() {
        let rule = RssRule {
            name: "Imported".to_string(),
            must_contain: "Imported".to_string(),
            save_path: "/old/place/Imported Show".to_string(),
            ..Default::default()
        };
        let mut ws = Workspace::from_rules(vec![rule].into_iter().collect());

        let edit = BulkEdit {
            save_path_base: Some("/new".to_string()),
            ..Default::default()
        };
        ws.bulk_edit(&edit, FilesystemMode::Posix);
        assert_eq!(
            ws.rules().get("Imported").unwrap().save_path,
            "/new/Imported Show"
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let mut ws = Workspace::new();
        ws.add_titles(
            &titles(&["Frieren", "Dandadan"]),
            None,
            &template(),
            DuplicatePolicy::Skip,
        );

        assert!(ws.remove("frieren"));
        assert!(!ws.remove("frieren"));
        assert!(ws.metadata("Frieren").is_none());

        ws.clear();
        assert!(ws.rules().is_empty());
        assert!(ws.metadata("Dandadan").is_none());
    }
}
