use crate::feedcheck::RuleMatches;
use crate::pathgen::{FilesystemMode, NormalizedTitle};
use crate::qbt::{Category, FeedInfo, SyncAction, SyncEntry, SyncReport};
use crate::rules::{RssRule, RuleIssue};
use crate::seasonal::SeasonalTitles;
use crate::workspace::ImportReport;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// One-line summary of a rule for listings
fn rule_line(rule: &RssRule) -> String {
    let mut flags = Vec::new();
    if !rule.enabled {
        flags.push("disabled");
    }
    if rule.use_regex {
        flags.push("regex");
    }
    if rule.add_paused == Some(true) {
        flags.push("paused");
    }
    if flags.is_empty() {
        rule.name.clone()
    } else {
        format!("{} [{}]", rule.name, flags.join(", "))
    }
}

/// Numbered list of rules with their pattern, save path and category
pub fn display_rules<'a>(
    rules: impl IntoIterator<Item = &'a RssRule>,
    writer: &mut impl Write,
) -> io::Result<()> {
    let mut count = 0usize;
    for (i, rule) in rules.into_iter().enumerate() {
        count += 1;
        writeln!(writer, "  {}. {}", i + 1, rule_line(rule))?;
        writeln!(writer, "     Match:    {}", rule.must_contain)?;
        if !rule.must_not_contain.is_empty() {
            writeln!(writer, "     Exclude:  {}", rule.must_not_contain)?;
        }
        if !rule.save_path.is_empty() {
            writeln!(writer, "     Save to:  {}", rule.save_path)?;
        }
        if !rule.assigned_category.is_empty() {
            writeln!(writer, "     Category: {}", rule.assigned_category)?;
        }
        if !rule.affected_feeds.is_empty() {
            writeln!(writer, "     Feeds:    {}", rule.affected_feeds.len())?;
        }
    }

    if count == 0 {
        writeln!(writer, "No rules.")?;
    } else {
        writeln!(writer)?;
        writeln!(writer, "{} rule(s)", count)?;
    }
    Ok(())
}

/// Summary of titles or rules added to a workspace
pub fn display_import_report(report: &ImportReport, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "Added:       {}", report.added.len())?;
    if !report.overwritten.is_empty() {
        writeln!(writer, "Overwritten: {}", report.overwritten.len())?;
        for (old, new) in &report.overwritten {
            writeln!(writer, "  {} -> {}", old, new)?;
        }
    }
    if !report.renamed.is_empty() {
        writeln!(writer, "Renamed:     {}", report.renamed.len())?;
        for (requested, stored) in &report.renamed {
            writeln!(writer, "  {} -> {}", requested, stored)?;
        }
    }
    if !report.skipped.is_empty() {
        writeln!(writer, "Skipped:     {} (already present)", report.skipped.len())?;
        for name in &report.skipped {
            writeln!(writer, "  {}", name)?;
        }
    }
    if !report.warnings.is_empty() {
        writeln!(writer, "Warnings:    {}", report.warnings.len())?;
        for warning in &report.warnings {
            writeln!(writer, "  - {}", warning)?;
        }
    }
    Ok(())
}

/// Validation issues per rule, errors and warnings apart
pub fn display_rule_issues(
    issues: &BTreeMap<String, Vec<RuleIssue>>,
    writer: &mut impl Write,
) -> io::Result<()> {
    for (name, rule_issues) in issues {
        for issue in rule_issues {
            let level = if issue.is_error() { "error" } else { "warning" };
            writeln!(writer, "  {} ({}): {}", name, level, issue)?;
        }
    }
    Ok(())
}

/// What a sync would do, without doing it
pub fn display_sync_plan(plan: &[SyncEntry], writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "========================================")?;
    writeln!(writer, "              DRY RUN")?;
    writeln!(writer, "========================================")?;
    writeln!(writer)?;

    if plan.is_empty() {
        writeln!(writer, "No rules to upload.")?;
        return Ok(());
    }

    writeln!(writer, "Planned changes:")?;
    writeln!(writer)?;
    for (i, entry) in plan.iter().enumerate() {
        let action = match &entry.action {
            SyncAction::Create => "create".to_string(),
            SyncAction::Update { server_name } => format!("overwrite '{}'", server_name),
            SyncAction::Rename { new_name } => format!("upload as '{}'", new_name),
            SyncAction::Skip => "skip (exists on server)".to_string(),
        };
        writeln!(writer, "  {}. {}: {}", i + 1, entry.rule.name, action)?;
    }

    let uploads = plan.iter().filter(|e| e.action != SyncAction::Skip).count();
    writeln!(writer)?;
    writeln!(writer, "----------------------------------------")?;
    writeln!(writer, "  {} rule(s) would be uploaded", uploads)?;
    writeln!(writer)?;
    writeln!(writer, "Run without --dry to apply these changes.")?;
    Ok(())
}

pub fn display_sync_report(report: &SyncReport, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "Uploaded {} rule(s).", report.uploaded())?;
    if !report.created.is_empty() {
        writeln!(writer, "  Created:     {}", report.created.len())?;
    }
    if !report.updated.is_empty() {
        writeln!(writer, "  Overwritten: {}", report.updated.len())?;
    }
    if !report.renamed.is_empty() {
        writeln!(writer, "  Renamed:     {}", report.renamed.len())?;
        for (from, to) in &report.renamed {
            writeln!(writer, "    {} -> {}", from, to)?;
        }
    }
    if !report.skipped.is_empty() {
        writeln!(writer, "  Skipped:     {}", report.skipped.len())?;
    }
    if report.has_failures() {
        writeln!(writer, "  Failed:      {}", report.failed.len())?;
        for (name, error) in &report.failed {
            writeln!(writer, "    {}: {}", name, error)?;
        }
    }
    Ok(())
}

/// Convert an `HH:MM` schedule time to 12-hour form
fn twelve_hour(time: &str) -> String {
    let Some((h, m)) = time.split_once(':') else {
        return time.to_string();
    };
    match h.trim().parse::<u32>() {
        Ok(hour) if hour < 24 => {
            let suffix = if hour < 12 { "AM" } else { "PM" };
            let hour12 = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("{}:{} {}", hour12, m.trim(), suffix)
        }
        _ => time.to_string(),
    }
}

pub fn display_seasonal(
    titles: &SeasonalTitles,
    time_24h: bool,
    writer: &mut impl Write,
) -> io::Result<()> {
    let source = match (titles.from_cache, titles.stale) {
        (true, true) => " (cached, may be out of date)",
        (true, false) => " (cached)",
        _ => "",
    };
    writeln!(writer, "{}: {} title(s){}", titles.season, titles.len(), source)?;
    writeln!(writer)?;

    for entry in &titles.entries {
        let when = match (&entry.air_day, &entry.air_time) {
            (Some(day), Some(time)) => {
                let time = if time_24h {
                    time.clone()
                } else {
                    twelve_hour(time)
                };
                format!("{} {} UTC", day, time)
            }
            (Some(day), None) => day.clone(),
            _ => String::new(),
        };
        if when.is_empty() {
            writeln!(writer, "  {}", entry.title)?;
        } else {
            writeln!(writer, "  {:<50} {}", entry.title, when)?;
        }
    }
    Ok(())
}

/// Folder names a title would get on each filesystem
pub fn display_check(
    title: &str,
    results: &[(FilesystemMode, NormalizedTitle)],
    writer: &mut impl Write,
) -> io::Result<()> {
    writeln!(writer, "{}", title)?;
    for (mode, result) in results {
        let status = if !result.is_valid {
            format!(
                "invalid: {}",
                result.error.as_deref().unwrap_or("unknown error")
            )
        } else if result.changed {
            "sanitized".to_string()
        } else {
            "ok".to_string()
        };
        writeln!(
            writer,
            "  {:<8} {:<40} ({})",
            mode.as_str(),
            result.folder_name,
            status
        )?;
    }
    Ok(())
}

pub fn display_preview(matches: &[RuleMatches], item_count: usize, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "Checked {} rule(s) against {} feed item(s)", matches.len(), item_count)?;
    writeln!(writer)?;

    for rule in matches {
        let suffix = if rule.enabled { "" } else { " [disabled]" };
        writeln!(writer, "{}{}: {} match(es)", rule.rule_name, suffix, rule.matched.len())?;
        for title in &rule.matched {
            writeln!(writer, "  {}", title)?;
        }
    }

    let unmatched = matches.iter().filter(|m| m.matched.is_empty()).count();
    if unmatched > 0 {
        writeln!(writer)?;
        writeln!(writer, "{} rule(s) matched nothing in this feed", unmatched)?;
    }
    Ok(())
}

pub fn display_categories(
    categories: &BTreeMap<String, Category>,
    writer: &mut impl Write,
) -> io::Result<()> {
    if categories.is_empty() {
        return writeln!(writer, "No categories.");
    }
    for category in categories.values() {
        if category.save_path.is_empty() {
            writeln!(writer, "{}", category.name)?;
        } else {
            writeln!(writer, "{:<30} {}", category.name, category.save_path)?;
        }
    }
    Ok(())
}

pub fn display_feeds(feeds: &[FeedInfo], writer: &mut impl Write) -> io::Result<()> {
    if feeds.is_empty() {
        return writeln!(writer, "No feeds.");
    }
    for feed in feeds {
        writeln!(writer, "{}", feed.path)?;
        writeln!(writer, "  {}", feed.url)?;
    }
    Ok(())
}
