//! Append-only compliance audit log.
//!
//! One JSON object per line, rotated by size. Audit writes must never take
//! the engine down: failures are logged and swallowed.

use std::path::PathBuf;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use vigil_core::config::AuditConfig;

// ── Event codes ─────────────────────────────────────────────────────────────

pub const RUN_STARTED: &str = "RUN_STARTED";
pub const RUN_COMPLETED: &str = "RUN_COMPLETED";
pub const RUN_FAILED: &str = "RUN_FAILED";
pub const RUN_CANCELLED: &str = "RUN_CANCELLED";
pub const REMEDIATION_APPLIED: &str = "REMEDIATION_APPLIED";
pub const PROPOSAL_CREATED: &str = "PROPOSAL_CREATED";
pub const PROPOSAL_APPROVED: &str = "PROPOSAL_APPROVED";
pub const PROPOSAL_REJECTED: &str = "PROPOSAL_REJECTED";
pub const PROPOSAL_APPLIED: &str = "PROPOSAL_APPLIED";
pub const PROPOSAL_APPLY_FAILED: &str = "PROPOSAL_APPLY_FAILED";

/// Rotating JSONL audit log.
pub struct AuditLog {
    config: Option<AuditConfig>,
    // Serializes append+rotate pairs.
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config: Some(config),
            write_lock: Mutex::new(()),
        }
    }

    /// A no-op audit log for tests.
    pub fn disabled() -> Self {
        Self {
            config: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Append one event. Best effort.
    pub async fn append(&self, event_code: &str, actor: &str, details: serde_json::Value) {
        let Some(config) = &self.config else {
            return;
        };

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_code": event_code,
            "actor": actor,
            "details": details,
        });
        let line = format!("{entry}\n");

        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.write_line(config, &line).await {
            warn!(error = %e, path = %config.path.display(), "Audit append failed");
        }
    }

    async fn write_line(&self, config: &AuditConfig, line: &str) -> std::io::Result<()> {
        if let Some(parent) = config.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if let Ok(metadata) = tokio::fs::metadata(&config.path).await {
            if metadata.len() + line.len() as u64 > config.max_bytes {
                rotate(&config.path, config.max_files).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

/// Shift `path` -> `path.1` -> `path.2` ... keeping at most `max_files`
/// rotated files.
async fn rotate(path: &PathBuf, max_files: usize) -> std::io::Result<()> {
    let rotated = |n: usize| PathBuf::from(format!("{}.{n}", path.display()));

    let oldest = rotated(max_files);
    if tokio::fs::metadata(&oldest).await.is_ok() {
        tokio::fs::remove_file(&oldest).await?;
    }
    for n in (1..max_files).rev() {
        let from = rotated(n);
        if tokio::fs::metadata(&from).await.is_ok() {
            tokio::fs::rename(&from, rotated(n + 1)).await?;
        }
    }
    if max_files > 0 {
        tokio::fs::rename(path, rotated(1)).await?;
    } else {
        tokio::fs::remove_file(path).await?;
    }
    Ok(())
}
