//! Rule export files and title/rule import sources

use super::{RssRule, RuleSet};
use crate::validator::{validate_rule_entry, validate_title_entry, EntryError, ImportWarning};
use crate::workspace::TitleEntry;
use serde_json::{Map, Value};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Key carrying the rule name in array-form exports
pub const RULE_NAME_KEY: &str = "ruleName";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file layout: {0}")]
    UnsupportedShape(&'static str),
}

/// Layout of an exported rules file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// `[{"ruleName": ..., ...ruleDef}]`
    #[default]
    Array,
    /// `{"<name>": ruleDef}`, the layout qBittorrent itself exports
    Qbittorrent,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Array => "array",
            ExportFormat::Qbittorrent => "qbittorrent",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "array" | "list" => Ok(ExportFormat::Array),
            "qbittorrent" | "qbt" | "native" | "map" => Ok(ExportFormat::Qbittorrent),
            other => Err(format!(
                "unknown export format '{}' (expected array or qbittorrent)",
                other
            )),
        }
    }
}

/// Rules read from a file, plus warnings for the entries that were dropped
#[derive(Debug, Default)]
pub struct RuleImport {
    pub rules: Vec<RssRule>,
    pub warnings: Vec<ImportWarning>,
    /// Layout the file was written in, so edits can keep it
    pub format: ExportFormat,
}

/// Titles read from a source, plus warnings for unusable entries
#[derive(Debug, Default)]
pub struct TitleImport {
    pub titles: Vec<TitleEntry>,
    pub warnings: Vec<ImportWarning>,
}

/// What [`load_import_file`] found
#[derive(Debug)]
pub enum ImportedFile {
    Rules(RuleImport),
    Titles(TitleImport),
}

/// Serialize rules for export. Tracking metadata is never included.
pub fn export_rules(rules: &RuleSet, format: ExportFormat) -> Value {
    match format {
        ExportFormat::Array => Value::Array(
            rules
                .iter()
                .map(|rule| {
                    let mut wire = match rule.to_wire() {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    };
                    wire.insert(RULE_NAME_KEY.to_string(), Value::String(rule.name.clone()));
                    Value::Object(wire)
                })
                .collect(),
        ),
        ExportFormat::Qbittorrent => Value::Object(
            rules
                .iter()
                .map(|rule| (rule.name.clone(), rule.to_wire()))
                .collect(),
        ),
    }
}

/// Write an export file atomically, creating parent directories
pub fn write_rules_file(path: &Path, rules: &RuleSet, format: ExportFormat) -> Result<(), ImportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let value = export_rules(rules, format);
    let temp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    fs::rename(&temp_path, path)?;

    info!(count = rules.len(), format = %format, "Exported rules to {:?}", path);
    Ok(())
}

fn rule_from_entry(name: &str, mut def: Value) -> Result<RssRule, EntryError> {
    if name.trim().is_empty() {
        return Err(EntryError::EmptyName);
    }
    validate_rule_entry(&def)?;
    if let Some(obj) = def.as_object_mut() {
        obj.remove(RULE_NAME_KEY);
    }
    RssRule::from_wire(name.trim(), def).map_err(|e| {
        debug!(name = %name, error = %e, "Rule failed to deserialize after validation");
        EntryError::WrongType {
            field: "ruleDef".to_string(),
            expected: "a qBittorrent rule definition",
        }
    })
}

/// Read rules from the native map or the array form; bad entries become warnings
pub fn import_rules(value: &Value) -> Result<RuleImport, ImportError> {
    let mut import = RuleImport::default();

    match value {
        Value::Object(map) => {
            import.format = ExportFormat::Qbittorrent;
            for (index, (name, def)) in map.iter().enumerate() {
                match rule_from_entry(name, def.clone()) {
                    Ok(rule) => import.rules.push(rule),
                    Err(error) => import.warnings.push(ImportWarning {
                        index,
                        name: Some(name.clone()),
                        error,
                    }),
                }
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let name = item.get(RULE_NAME_KEY).and_then(Value::as_str);
                let result = match name {
                    Some(name) => rule_from_entry(name, item.clone()),
                    None if item.is_object() => Err(EntryError::MissingField(RULE_NAME_KEY)),
                    None => Err(EntryError::NotAnObject),
                };
                match result {
                    Ok(rule) => import.rules.push(rule),
                    Err(error) => import.warnings.push(ImportWarning {
                        index,
                        name: name.map(str::to_string),
                        error,
                    }),
                }
            }
        }
        _ => {
            return Err(ImportError::UnsupportedShape(
                "expected an object keyed by rule name or an array of rules",
            ))
        }
    }

    for warning in &import.warnings {
        warn!("Skipping rule {}", warning);
    }
    info!(
        rules = import.rules.len(),
        warnings = import.warnings.len(),
        "Imported rules"
    );
    Ok(import)
}

pub fn read_rules_file(path: &Path) -> Result<RuleImport, ImportError> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    import_rules(&value)
}

fn push_title(import: &mut TitleImport, index: usize, value: &Value) {
    match validate_title_entry(value) {
        Ok(fields) => import.titles.push(TitleEntry::from(fields)),
        Err(error) => import.warnings.push(ImportWarning {
            index,
            name: None,
            error,
        }),
    }
}

fn titles_from_json(value: &Value, import: &mut TitleImport) -> Result<(), ImportError> {
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                push_title(import, index, item);
            }
        }
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("data") {
                for (index, item) in items.iter().enumerate() {
                    push_title(import, index, item);
                }
            } else if map.contains_key("title") || map.contains_key("node") {
                push_title(import, 0, value);
            } else {
                // Keys are the titles
                for (index, (title, details)) in map.iter().enumerate() {
                    let mut entry = match details {
                        Value::Object(obj) => obj.clone(),
                        _ => Map::new(),
                    };
                    entry.insert("title".to_string(), Value::String(title.clone()));
                    push_title(import, index, &Value::Object(entry));
                }
            }
        }
        _ => {
            return Err(ImportError::UnsupportedShape(
                "expected a list of titles or title objects",
            ))
        }
    }
    Ok(())
}

/// Parse titles from extension output, JSON lists, MAL-style objects or plain lines
pub fn parse_title_source(content: &str) -> Result<TitleImport, ImportError> {
    let mut import = TitleImport::default();
    let trimmed = content.trim_start_matches('\u{feff}').trim();

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            titles_from_json(&value, &mut import)?;
            debug!(titles = import.titles.len(), "Parsed JSON title source");
            return Ok(import);
        }
        debug!("Title source looks like JSON but does not parse, reading it as lines");
    }

    for line in trimmed.lines() {
        let title = line.trim();
        if title.is_empty() || title.starts_with('#') {
            continue;
        }
        import.titles.push(TitleEntry::new(title));
    }
    debug!(titles = import.titles.len(), "Parsed line-delimited title source");
    Ok(import)
}

fn looks_like_rules(value: &Value) -> bool {
    match value {
        Value::Array(items) => items
            .iter()
            .any(|item| item.get(RULE_NAME_KEY).is_some()),
        Value::Object(map) => {
            !map.is_empty()
                && map.values().all(Value::is_object)
                && map
                    .values()
                    .any(|def| def.get("mustContain").is_some() || def.get("affectedFeeds").is_some())
        }
        _ => false,
    }
}

/// Read a file that may hold either rules or titles
pub fn load_import_file(path: &Path) -> Result<ImportedFile, ImportError> {
    let content = fs::read_to_string(path)?;
    let trimmed = content.trim_start_matches('\u{feff}').trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if looks_like_rules(&value) {
            return Ok(ImportedFile::Rules(import_rules(&value)?));
        }
    }

    Ok(ImportedFile::Titles(parse_title_source(&content)?))
}
