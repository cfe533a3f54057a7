//! Vigil configuration types.
//!
//! One `VigilConfig` is constructed at startup and passed by `Arc` into each
//! component. Business logic never reads process environment state directly;
//! the environment is captured once into an [`EnvSnapshot`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VigilConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub checks: CheckConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer tokens accepted by the API. Empty means anonymous access.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8420
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_keys: Vec::new(),
        }
    }
}

/// Check execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Worker-pool size for concurrent checks.
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    /// Per-rule timeout; a timed-out check reports `error`, not `failed`.
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

fn default_max_concurrent_checks() -> usize {
    5
}

fn default_check_timeout_ms() -> u64 {
    300_000
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: default_max_concurrent_checks(),
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}

/// In-process scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval_secs(),
        }
    }
}

/// Rule and report storage layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "default_retention_days")]
    pub report_retention_days: u32,
    /// Terminal runs and decided proposals are evicted from memory after
    /// this age; the persisted report remains the archive.
    #[serde(default = "default_history_retention_secs")]
    pub history_retention_secs: u64,
}

fn default_rules_dir() -> PathBuf {
    PathBuf::from("rules")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_retention_days() -> u32 {
    90
}

fn default_history_retention_secs() -> u64 {
    24 * 60 * 60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rules_dir: default_rules_dir(),
            reports_dir: default_reports_dir(),
            report_retention_days: default_retention_days(),
            history_retention_secs: default_history_retention_secs(),
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
    /// Rotate when the active file grows past this size.
    #[serde(default = "default_audit_max_bytes")]
    pub max_bytes: u64,
    /// Rotated files kept besides the active one.
    #[serde(default = "default_audit_max_files")]
    pub max_files: usize,
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("logs/compliance-audit.jsonl")
}

fn default_audit_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_audit_max_files() -> usize {
    5
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
            max_bytes: default_audit_max_bytes(),
            max_files: default_audit_max_files(),
        }
    }
}

impl VigilConfig {
    /// Load configuration from a JSON file. Missing sections fall back to
    /// defaults.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Process environment captured once at startup. The env-validation probe
/// reads from this snapshot, never from `std::env` mid-run.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs (tests, fixed deployments).
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Present and non-empty.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = VigilConfig::default();
        assert_eq!(config.checks.max_concurrent_checks, 5);
        assert_eq!(config.checks.check_timeout_ms, 300_000);
        assert_eq!(config.server.port, 8420);
        assert_eq!(config.storage.rules_dir, PathBuf::from("rules"));
        assert_eq!(config.storage.history_retention_secs, 86_400);
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let parsed: VigilConfig =
            serde_json::from_str(r#"{"checks": {"max_concurrent_checks": 2}}"#).unwrap();
        assert_eq!(parsed.checks.max_concurrent_checks, 2);
        assert_eq!(parsed.checks.check_timeout_ms, 300_000);
        assert!(!parsed.scheduler.enabled);
    }

    #[test]
    fn test_env_snapshot_is_set_requires_non_empty() {
        let snapshot = EnvSnapshot::from_pairs(vec![
            ("DATA_DIR".to_string(), "/var/data".to_string()),
            ("EMPTY".to_string(), String::new()),
        ]);
        assert!(snapshot.is_set("DATA_DIR"));
        assert!(!snapshot.is_set("EMPTY"));
        assert!(!snapshot.is_set("MISSING"));
    }
}
