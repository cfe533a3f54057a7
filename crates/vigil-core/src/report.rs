//! Compliance reports: a derived, read-only view over one run.
//!
//! The report struct is the single canonical representation; JSON and text
//! encodings are pure projections of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::check::{CheckResult, CheckStatus, ComplianceRun, RunStatus, RunSummary};
use crate::proposal::{ProposalStatus, RemediationProposal};
use crate::rule::Category;

/// Compliance score: `round(passed / total * 100)`, clamped to [0, 100].
/// An empty run is fully compliant.
pub fn score(passed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (passed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Per-category rollup of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub summary: RunSummary,
}

/// A failed or errored check, with where its remediation stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedItem {
    pub rule_id: String,
    pub target: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_status: Option<ProposalStatus>,
}

/// Immutable report over one compliance run. Regenerating for the same
/// `check_id` produces a new revision, never a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub check_id: String,
    pub revision: u32,
    pub generated_at: DateTime<Utc>,
    pub run_status: RunStatus,
    pub score: u8,
    pub summary: RunSummary,
    pub categories: Vec<CategoryBreakdown>,
    pub unresolved: Vec<UnresolvedItem>,
}

impl ComplianceReport {
    /// Build a report from a run and the proposals staged for it.
    pub fn build(run: &ComplianceRun, proposals: &[RemediationProposal], revision: u32) -> Self {
        let summary = RunSummary::from_results(&run.results);

        // Group results per category; rules without a recorded category are
        // rolled up under Operational.
        let mut by_category: BTreeMap<&'static str, (Category, Vec<&CheckResult>)> = BTreeMap::new();
        for result in &run.results {
            let category = run
                .rule_categories
                .get(&result.rule_id)
                .copied()
                .unwrap_or(Category::Operational);
            by_category
                .entry(category.as_str())
                .or_insert_with(|| (category, Vec::new()))
                .1
                .push(result);
        }

        let categories = by_category
            .into_values()
            .map(|(category, results)| CategoryBreakdown {
                category,
                summary: RunSummary::from_results(results.into_iter()),
            })
            .collect();

        let unresolved = run
            .results
            .iter()
            .filter(|r| r.status.is_unresolved())
            .map(|r| {
                let proposal = proposals.iter().find(|p| p.rule_id == r.rule_id);
                UnresolvedItem {
                    rule_id: r.rule_id.clone(),
                    target: r.target.clone(),
                    status: r.status,
                    message: r.message.clone(),
                    remediated: r.remediated,
                    proposal_id: proposal.map(|p| p.proposal_id.clone()),
                    proposal_status: proposal.map(|p| p.status),
                }
            })
            .collect();

        Self {
            check_id: run.check_id.clone(),
            revision,
            generated_at: Utc::now(),
            run_status: run.status,
            score: score(summary.passed, summary.total),
            summary,
            categories,
            unresolved,
        }
    }

    /// Human-readable projection of the report.
    pub fn to_text(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "Compliance report for run {}", self.check_id);
        let _ = writeln!(
            out,
            "  revision {} generated at {}",
            self.revision,
            self.generated_at.to_rfc3339()
        );
        let _ = writeln!(out, "  run status: {:?}", self.run_status);
        let _ = writeln!(out, "  score: {}/100", self.score);
        let _ = writeln!(
            out,
            "  checks: {} total, {} passed, {} failed, {} warnings, {} errors",
            self.summary.total,
            self.summary.passed,
            self.summary.failed,
            self.summary.warnings,
            self.summary.errors
        );

        for breakdown in &self.categories {
            let _ = writeln!(
                out,
                "  [{}] {} passed / {} total",
                breakdown.category.as_str(),
                breakdown.summary.passed,
                breakdown.summary.total
            );
        }

        if self.unresolved.is_empty() {
            let _ = writeln!(out, "  no unresolved items");
        } else {
            let _ = writeln!(out, "  unresolved:");
            for item in &self.unresolved {
                let remediation = match (&item.proposal_status, item.remediated) {
                    (Some(status), _) => format!("proposal {:?}", status),
                    (None, Some(true)) => "remediated".to_string(),
                    (None, Some(false)) => "remediation failed".to_string(),
                    (None, None) => "no remediation".to_string(),
                };
                let _ = writeln!(
                    out,
                    "    {} [{:?}] {} ({})",
                    item.rule_id, item.status, item.message, remediation
                );
            }
        }

        out
    }
}
