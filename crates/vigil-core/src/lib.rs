//! Vigil Core - shared types for the compliance validation engine
//!
//! This crate provides:
//! - Rule and validation models
//! - Check results and compliance runs
//! - Remediation proposals and the approval decision trail
//! - Compliance reports
//! - Configuration and the shared error taxonomy

pub mod check;
pub mod config;
pub mod error;
pub mod proposal;
pub mod report;
pub mod rule;

pub use check::{CheckResult, CheckStatus, ComplianceRun, RunProgress, RunStatus, RunSummary};
pub use config::VigilConfig;
pub use error::{ProbeError, SchemaError};
pub use proposal::{ApprovalDecision, ProposalStatus, RemediationProposal};
pub use report::ComplianceReport;
pub use rule::{Category, Remediation, RemediationAction, RemediationMode, Rule, Severity, Validation};
