//! Rule model: declarative compliance checks and their remediations.

use serde::{Deserialize, Serialize};

/// Severity of a rule violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Category a rule belongs to; one rule file per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Security,
    Performance,
    Configuration,
    Integration,
    Operational,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Configuration => "configuration",
            Category::Integration => "integration",
            Category::Operational => "operational",
        }
    }
}

/// Validation condition for a rule. The variant selects the probe and its
/// comparison semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Validation {
    /// Exact octal mode match on a regular file.
    FilePermission { path: String, expected_mode: String },
    /// Exact octal mode match on a directory.
    DirectoryPermission { path: String, expected_mode: String },
    /// Certificate days remaining must be >= the threshold.
    SslCertificate {
        host: String,
        #[serde(default = "default_tls_port")]
        port: u16,
        min_days_remaining: i64,
    },
    /// Measured latency must be <= max_time_ms; between warn_time_ms and
    /// max_time_ms yields a warning.
    ResponseTime {
        url: String,
        max_time_ms: u64,
        #[serde(default)]
        warn_time_ms: Option<u64>,
    },
    /// Measured memory usage percentage must be <= the threshold.
    MemoryUsage { max_usage_pct: f64 },
    /// Measured CPU usage percentage must be <= the threshold.
    CpuUsage { max_usage_pct: f64 },
    /// All required variables present and non-empty.
    EnvValidation { required_vars: Vec<String> },
}

fn default_tls_port() -> u16 {
    443
}

impl Validation {
    /// Stable name of the probe type, used in messages and metrics.
    pub fn probe_type(&self) -> &'static str {
        match self {
            Validation::FilePermission { .. } => "file_permission",
            Validation::DirectoryPermission { .. } => "directory_permission",
            Validation::SslCertificate { .. } => "ssl_certificate",
            Validation::ResponseTime { .. } => "response_time",
            Validation::MemoryUsage { .. } => "memory_usage",
            Validation::CpuUsage { .. } => "cpu_usage",
            Validation::EnvValidation { .. } => "env_validation",
        }
    }
}

/// A remediation action, modeled as a closed set of typed operations.
/// Free-text shell strings are deliberately not representable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RemediationAction {
    Chmod { path: String, mode: String },
    RestartService { unit: String },
    RenewCertificate { host: String },
    RunCommand {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl RemediationAction {
    /// Short human-readable description for audit entries and reports.
    pub fn describe(&self) -> String {
        match self {
            RemediationAction::Chmod { path, mode } => format!("chmod {mode} {path}"),
            RemediationAction::RestartService { unit } => format!("restart service {unit}"),
            RemediationAction::RenewCertificate { host } => format!("renew certificate for {host}"),
            RemediationAction::RunCommand { program, args } => {
                format!("run {} {}", program, args.join(" "))
            }
        }
    }
}

/// Remediation attached to a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remediation {
    pub action: RemediationAction,
    #[serde(default)]
    pub description: String,
}

/// How a failed check's remediation is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationMode {
    /// No remediation configured.
    None,
    /// Apply immediately and re-verify.
    AutoFix,
    /// Stage a proposal and wait for a human decision.
    RequireApproval,
}

/// A declarative compliance rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub rule_name: String,
    pub category: Category,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    pub target: String,
    pub validation: Validation,
    #[serde(default)]
    pub remediation: Option<Remediation>,
    #[serde(default)]
    pub auto_fix: bool,
    #[serde(default = "default_require_approval")]
    pub require_approval: bool,
}

// The documented default posture is human approval.
fn default_require_approval() -> bool {
    true
}

impl Rule {
    /// Resolve the remediation dispatch mode. When both `auto_fix` and
    /// `require_approval` are set, approval takes precedence.
    pub fn remediation_mode(&self) -> RemediationMode {
        if self.remediation.is_none() {
            return RemediationMode::None;
        }
        if self.require_approval {
            RemediationMode::RequireApproval
        } else if self.auto_fix {
            RemediationMode::AutoFix
        } else {
            RemediationMode::None
        }
    }
}
