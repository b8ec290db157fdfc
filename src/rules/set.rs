use super::types::{RssRule, RuleIssue};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Key used to detect duplicate rule names: case-folded, trimmed, inner whitespace collapsed
pub fn normalize_rule_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// What to do when an inserted rule's name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Skip,
    Overwrite,
    Rename,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Overwrite => "overwrite",
            DuplicatePolicy::Rename => "rename",
        })
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(DuplicatePolicy::Skip),
            "overwrite" | "replace" => Ok(DuplicatePolicy::Overwrite),
            "rename" => Ok(DuplicatePolicy::Rename),
            other => Err(format!(
                "unknown duplicate policy '{}' (expected skip, overwrite or rename)",
                other
            )),
        }
    }
}

/// Result of [`RuleSet::insert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An existing rule kept its place; the new one was dropped
    Skipped,
    /// The existing rule (by its previous name) was replaced
    Overwritten(String),
    /// The new rule was stored under this name
    Renamed(String),
}

/// Rules keyed by normalized name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: BTreeMap<String, RssRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        mut rule: RssRule,
        policy: DuplicatePolicy,
    ) -> Result<InsertOutcome, RuleIssue> {
        rule.name = rule.name.trim().to_string();
        if rule.name.is_empty() {
            return Err(RuleIssue::EmptyName);
        }

        let key = normalize_rule_name(&rule.name);
        let Some(existing) = self.rules.get(&key) else {
            self.rules.insert(key, rule);
            return Ok(InsertOutcome::Inserted);
        };

        match policy {
            DuplicatePolicy::Skip => {
                debug!(name = %rule.name, existing = %existing.name, "Skipping duplicate rule");
                Ok(InsertOutcome::Skipped)
            }
            DuplicatePolicy::Overwrite => {
                let old_name = existing.name.clone();
                debug!(name = %rule.name, "Overwriting rule {}", old_name);
                self.rules.insert(key, rule);
                Ok(InsertOutcome::Overwritten(old_name))
            }
            DuplicatePolicy::Rename => {
                let new_name = self.unique_name(&rule.name);
                debug!(name = %rule.name, renamed = %new_name, "Renaming duplicate rule");
                rule.name = new_name.clone();
                self.rules.insert(normalize_rule_name(&new_name), rule);
                Ok(InsertOutcome::Renamed(new_name))
            }
        }
    }

    /// `base (2)`, `base (3)`, ... whichever is free first
    fn unique_name(&self, base: &str) -> String {
        (2..)
            .map(|n| format!("{} ({})", base, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(&normalize_rule_name(name))
    }

    pub fn get(&self, name: &str) -> Option<&RssRule> {
        self.rules.get(&normalize_rule_name(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<RssRule> {
        self.rules.remove(&normalize_rule_name(name))
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RssRule> {
        self.rules.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RssRule> {
        self.rules.values_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.values().map(|rule| rule.name.clone()).collect()
    }
}

impl FromIterator<RssRule> for RuleSet {
    /// Later duplicates are skipped, as are unnamed rules
    fn from_iter<I: IntoIterator<Item = RssRule>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for rule in iter {
            let _ = set.insert(rule, DuplicatePolicy::Skip);
        }
        set
    }
}
