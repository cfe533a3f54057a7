//! Shared error taxonomy.

use thiserror::Error;

/// A rule definition that failed schema validation. Non-fatal: the rule is
/// excluded from the active set and the load continues.
#[derive(Debug, Clone, Error)]
#[error("schema error in {source_file}: {reason}")]
pub struct SchemaError {
    /// The rule_id, when it could be extracted from the bad entry.
    pub rule_id: Option<String>,
    pub source_file: String,
    pub reason: String,
}

/// A probe that could not evaluate its condition. Maps to a check result of
/// `error`, never `failed`.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// Target unreachable: connection refused, missing path, DNS failure.
    #[error("target unreachable: {0}")]
    Unreachable(String),

    /// I/O fault while probing.
    #[error("probe I/O error: {0}")]
    Io(String),

    /// The check exceeded its configured timeout.
    #[error("TIMEOUT")]
    Timeout,

    /// The probe cannot run on this host (e.g. /proc not available).
    #[error("probe unsupported on this host: {0}")]
    Unsupported(String),
}
