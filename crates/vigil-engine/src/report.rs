//! Report generation and persistence.
//!
//! Reports are immutable once generated; regenerating for the same run
//! produces a new revision. Persisted reports live under the reports
//! directory with date-stamped filenames and are pruned by retention age.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use vigil_core::check::ComplianceRun;
use vigil_core::proposal::RemediationProposal;
use vigil_core::report::ComplianceReport;

/// Builds, persists and prunes compliance reports.
pub struct ReportGenerator {
    reports_dir: PathBuf,
    retention_days: u32,
    revisions: RwLock<HashMap<String, u32>>,
}

impl ReportGenerator {
    pub fn new(reports_dir: PathBuf, retention_days: u32) -> Self {
        Self {
            reports_dir,
            retention_days,
            revisions: RwLock::new(HashMap::new()),
        }
    }

    /// Build the next revision of the report for a run.
    pub async fn generate(
        &self,
        run: &ComplianceRun,
        proposals: &[RemediationProposal],
    ) -> ComplianceReport {
        let revision = {
            let mut revisions = self.revisions.write().await;
            let entry = revisions.entry(run.check_id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        ComplianceReport::build(run, proposals, revision)
    }

    /// Write a report to the report store. Returns the path written.
    pub async fn persist(&self, report: &ComplianceReport) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.reports_dir).await?;

        let filename = format!(
            "compliance-report-{}-{}-r{}.json",
            report.generated_at.format("%Y-%m-%d"),
            report.check_id,
            report.revision
        );
        let path = self.reports_dir.join(filename);

        let body = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&path, body).await?;
        info!(path = %path.display(), score = report.score, "Report persisted");
        Ok(path)
    }

    /// Remove persisted reports older than the retention window.
    pub async fn prune_expired(&self) -> std::io::Result<usize> {
        let cutoff = SystemTime::now() - Duration::from_secs(u64::from(self.retention_days) * 86_400);
        let mut removed = 0;

        let mut entries = match tokio::fs::read_dir(&self.reports_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_report_file(&path) {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if modified < cutoff {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Could not prune report");
                } else {
                    debug!(path = %path.display(), "Pruned expired report");
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

fn is_report_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("compliance-report-"))
}
