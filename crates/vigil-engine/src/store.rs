//! Rule store: loads declarative rule files and validates each entry.
//!
//! One JSON file per category under the rules directory, each holding an
//! array of rule objects. A malformed entry is excluded from the active set
//! and logged; an unreadable directory or file aborts the load.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use vigil_core::error::SchemaError;
use vigil_core::rule::{Category, Rule};

use crate::error::RuleStoreError;

/// Immutable set of active rules plus the ledger of rejected definitions.
/// The store is read-only for the lifetime of a run: the executor works from
/// a snapshot taken at trigger time.
pub struct RuleStore {
    rules: Arc<[Rule]>,
    rejected: Vec<SchemaError>,
}

impl RuleStore {
    /// Load every `*.json` file under `rules_dir`.
    pub fn load(rules_dir: &Path) -> Result<Self, RuleStoreError> {
        let mut rules: Vec<Rule> = Vec::new();
        let mut rejected: Vec<SchemaError> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        let mut files: Vec<_> = std::fs::read_dir(rules_dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        for file in &files {
            let file_name = file.display().to_string();
            let raw = std::fs::read_to_string(file)?;

            // A file that is not a JSON array rejects as a whole, but does
            // not abort the load of the remaining files.
            let entries: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    let error = SchemaError {
                        rule_id: None,
                        source_file: file_name.clone(),
                        reason: format!("not a JSON rule array: {e}"),
                    };
                    warn!(file = %file_name, reason = %error.reason, "Rejected rule file");
                    rejected.push(error);
                    continue;
                }
            };

            for entry in entries {
                let rule_id = entry
                    .get("rule_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);

                match Self::validate_entry(entry, &file_name, &mut seen_ids) {
                    Ok(rule) => rules.push(rule),
                    Err(reason) => {
                        warn!(
                            file = %file_name,
                            rule_id = rule_id.as_deref().unwrap_or("<unknown>"),
                            reason = %reason,
                            "Rejected rule"
                        );
                        rejected.push(SchemaError {
                            rule_id,
                            source_file: file_name.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        info!(
            active = rules.len(),
            rejected = rejected.len(),
            files = files.len(),
            "Rule store loaded"
        );

        Ok(Self {
            rules: rules.into(),
            rejected,
        })
    }

    /// Build a store from in-memory rules (tests, embedded defaults).
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: rules.into(),
            rejected: Vec::new(),
        }
    }

    fn validate_entry(
        entry: serde_json::Value,
        file: &str,
        seen_ids: &mut HashSet<String>,
    ) -> Result<Rule, String> {
        let rule: Rule =
            serde_json::from_value(entry).map_err(|e| format!("schema violation: {e}"))?;

        if rule.rule_id.trim().is_empty() {
            return Err("empty rule_id".to_string());
        }
        if rule.target.trim().is_empty() {
            return Err("empty target".to_string());
        }
        if !seen_ids.insert(rule.rule_id.clone()) {
            return Err(format!("duplicate rule_id {} in {file}", rule.rule_id));
        }

        Ok(rule)
    }

    /// List active rules, optionally filtered by category.
    pub fn list_rules(&self, category: Option<Category>) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|rule| category.is_none_or(|c| rule.category == c))
            .cloned()
            .collect()
    }

    /// Look up a single rule.
    pub fn get_rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.rule_id == rule_id)
    }

    /// Rules matching the requested scope. Empty filters mean "all".
    pub fn snapshot(&self, targets: &[String], rule_ids: &[String]) -> Arc<[Rule]> {
        if targets.is_empty() && rule_ids.is_empty() {
            return self.rules.clone();
        }
        self.rules
            .iter()
            .filter(|rule| {
                (targets.is_empty() || targets.iter().any(|t| *t == rule.target))
                    && (rule_ids.is_empty() || rule_ids.iter().any(|id| *id == rule.rule_id))
            })
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Definitions excluded at load time, with reasons.
    pub fn rejected(&self) -> &[SchemaError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_RULE: &str = r#"{
        "rule_id": "SEC-001",
        "rule_name": "Config file permissions",
        "category": "security",
        "severity": "high",
        "target": "filesystem-server",
        "validation": {"type": "file_permission", "path": "/opt/x", "expected_mode": "644"}
    }"#;

    fn write_rules(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_load_skips_malformed_rule_but_keeps_good_ones() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(
            dir.path(),
            "security.json",
            &format!(r#"[{GOOD_RULE}, {{"rule_id": "SEC-002", "category": "nonsense"}}]"#),
        );

        let store = RuleStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.rejected().len(), 1);
        assert_eq!(store.rejected()[0].rule_id.as_deref(), Some("SEC-002"));
        assert!(store.get_rule("SEC-001").is_some());
    }

    #[test]
    fn test_load_rejects_duplicate_rule_ids() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(
            dir.path(),
            "security.json",
            &format!("[{GOOD_RULE}, {GOOD_RULE}]"),
        );

        let store = RuleStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.rejected().len(), 1);
        assert!(store.rejected()[0].reason.contains("duplicate"));
    }

    #[test]
    fn test_load_unreadable_dir_is_fatal() {
        let result = RuleStore::load(Path::new("/definitely/not/a/rules/dir"));
        assert!(matches!(result, Err(RuleStoreError::Io(_))));
    }

    #[test]
    fn test_malformed_file_rejected_without_aborting_load() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(dir.path(), "broken.json", "{ not json");
        write_rules(dir.path(), "security.json", &format!("[{GOOD_RULE}]"));

        let store = RuleStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.rejected().len(), 1);
        assert!(store.rejected()[0].rule_id.is_none());
    }

    #[test]
    fn test_snapshot_filters_by_target_and_rule_id() {
        let rule: Rule = serde_json::from_str(GOOD_RULE).unwrap();
        let mut other = rule.clone();
        other.rule_id = "SEC-002".into();
        other.target = "postgres-proxy".into();
        let store = RuleStore::from_rules(vec![rule, other]);

        assert_eq!(store.snapshot(&[], &[]).len(), 2);
        assert_eq!(store.snapshot(&["postgres-proxy".into()], &[]).len(), 1);
        assert_eq!(store.snapshot(&[], &["SEC-001".into()]).len(), 1);
        assert_eq!(
            store
                .snapshot(&["filesystem-server".into()], &["SEC-002".into()])
                .len(),
            0
        );
    }

    #[test]
    fn test_list_rules_by_category() {
        let rule: Rule = serde_json::from_str(GOOD_RULE).unwrap();
        let store = RuleStore::from_rules(vec![rule]);
        assert_eq!(store.list_rules(Some(Category::Security)).len(), 1);
        assert_eq!(store.list_rules(Some(Category::Performance)).len(), 0);
    }
}
