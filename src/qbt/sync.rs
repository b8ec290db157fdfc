//! Higher-level operations built on [`QbtClient`]

use super::client::QbtClient;
use super::types::QbtError;
use crate::config::ConnectionSettings;
use crate::rules::{DuplicatePolicy, InsertOutcome, RssRule, RuleSet};
use tracing::{debug, info, warn};

/// Log in, read the version, log out. Returns a one-line status for display.
pub fn ping(settings: &ConnectionSettings) -> Result<String, QbtError> {
    let mut client = QbtClient::new(settings)?;
    client.connect()?;
    let version = client.get_version();
    if let Err(e) = client.close() {
        debug!("Logout after ping failed: {}", e);
    }
    Ok(format!("Connected - version {}", version?))
}

/// How one local rule will be written to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// No server rule has this name
    Create,
    /// Replaces the server rule of that (equivalent) name
    Update { server_name: String },
    /// Uploaded under a fresh name next to the existing server rule
    Rename { new_name: String },
    /// A server rule of this name exists and is left alone
    Skip,
}

#[derive(Debug, Clone)]
pub struct SyncEntry {
    pub rule: RssRule,
    pub action: SyncAction,
}

impl SyncEntry {
    /// Name the rule will have on the server
    pub fn target_name(&self) -> &str {
        match &self.action {
            SyncAction::Update { server_name } => server_name,
            SyncAction::Rename { new_name } => new_name,
            SyncAction::Create | SyncAction::Skip => &self.rule.name,
        }
    }
}

/// Decide, without touching the network, what syncing `rules` would do
pub fn plan_sync(server_rules: &[RssRule], rules: &RuleSet, policy: DuplicatePolicy) -> Vec<SyncEntry> {
    let mut merged: RuleSet = server_rules.iter().cloned().collect();

    rules
        .iter()
        .map(|rule| {
            let action = match merged.insert(rule.clone(), policy) {
                Ok(InsertOutcome::Inserted) => SyncAction::Create,
                Ok(InsertOutcome::Skipped) => SyncAction::Skip,
                Ok(InsertOutcome::Overwritten(server_name)) => SyncAction::Update { server_name },
                Ok(InsertOutcome::Renamed(new_name)) => SyncAction::Rename { new_name },
                // RuleSet keys are never empty
                Err(_) => SyncAction::Skip,
            };
            SyncEntry {
                rule: rule.clone(),
                action,
            }
        })
        .collect()
}

/// Outcome of a [`sync_rules`] run
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub renamed: Vec<(String, String)>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, QbtError)>,
}

impl SyncReport {
    pub fn uploaded(&self) -> usize {
        self.created.len() + self.updated.len() + self.renamed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Push `rules` to a connected client.
///
/// Server rules are read first so duplicates follow `policy`. A rule that
/// fails to upload is recorded in the report and the batch carries on.
pub fn sync_rules(
    client: &QbtClient,
    rules: &RuleSet,
    policy: DuplicatePolicy,
) -> Result<SyncReport, QbtError> {
    let server_rules = client.get_rules()?;
    info!(
        local = rules.len(),
        server = server_rules.len(),
        policy = %policy,
        "Syncing rules"
    );

    let mut report = SyncReport::default();

    for entry in plan_sync(&server_rules, rules, policy) {
        if entry.action == SyncAction::Skip {
            debug!(name = %entry.rule.name, "Rule exists on server, skipping");
            report.skipped.push(entry.rule.name);
            continue;
        }

        let mut rule = entry.rule.clone();
        rule.name = entry.target_name().to_string();

        match client.set_rule(&rule) {
            Ok(()) => match entry.action {
                SyncAction::Create => report.created.push(rule.name),
                SyncAction::Update { .. } => report.updated.push(rule.name),
                SyncAction::Rename { new_name } => {
                    report.renamed.push((entry.rule.name, new_name))
                }
                SyncAction::Skip => {}
            },
            Err(e) => {
                warn!(name = %entry.rule.name, "Upload failed: {}", e);
                report.failed.push((entry.rule.name, e));
            }
        }
    }

    Ok(report)
}
