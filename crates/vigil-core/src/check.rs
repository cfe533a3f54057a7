//! Check results and compliance runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::rule::Category;

/// Verdict of evaluating one rule against one target.
///
/// `Failed` means the condition evaluated false; `Error` means the condition
/// could not be evaluated (unreachable target, timeout). Operators triage
/// these differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
    Error,
}

impl CheckStatus {
    /// Whether this result counts against the compliance score.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, CheckStatus::Failed | CheckStatus::Error)
    }
}

/// Result of one rule evaluation. Append-only once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub rule_id: String,
    pub target: String,
    pub status: CheckStatus,
    pub message: String,
    /// Set only when an auto-fix was attempted: true if the re-check passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediated: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of a compliance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// Summary counts over a run's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CheckResult>) -> Self {
        let mut summary = RunSummary::default();
        for result in results {
            summary.total += 1;
            match result.status {
                CheckStatus::Passed => summary.passed += 1,
                CheckStatus::Failed => summary.failed += 1,
                CheckStatus::Warning => summary.warnings += 1,
                CheckStatus::Error => summary.errors += 1,
            }
        }
        summary
    }
}

/// Progress of a run: completed checks out of scheduled checks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunProgress {
    pub done: usize,
    pub total: usize,
}

/// One batch execution of compliance checks, identified by `check_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRun {
    pub check_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: RunProgress,
    pub summary: RunSummary,
    pub results: Vec<CheckResult>,
    /// Category of each scheduled rule, for report rollups.
    #[serde(default)]
    pub rule_categories: HashMap<String, Category>,
    /// Set when the run aborted on an infrastructure fault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ComplianceRun {
    pub fn new(check_id: String, total: usize) -> Self {
        Self {
            check_id,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            progress: RunProgress { done: 0, total },
            summary: RunSummary::default(),
            results: Vec::new(),
            rule_categories: HashMap::new(),
            failure: None,
        }
    }

    /// Record one result and refresh progress and summary.
    pub fn record(&mut self, result: CheckResult) {
        self.results.push(result);
        self.progress.done = self.results.len();
        self.summary = RunSummary::from_results(&self.results);
    }
}
