//! # vigil-engine
//!
//! Compliance validation engine: rule storage, check execution, remediation
//! and reporting.
//!
//! This crate provides:
//! - [`RuleStore`] - Loads and validates rule definitions from disk
//! - [`CheckExecutor`] - Runs rules through their probes with bounded concurrency
//! - [`RemediationEngine`] - Auto-fix with re-verification, or proposal staging
//! - [`ApprovalWorkflow`] - Human approval gate for staged remediations
//! - [`ReportGenerator`] - Scored reports with persistence and retention
//! - [`Scheduler`] - Interval-driven runs with skip-if-busy
//! - [`AuditLog`] - Append-only JSONL trail of runs and remediations
//!
//! Probes and remediation actions sit behind traits ([`Probe`],
//! [`ProbeFactory`], [`ActionRunner`]) so the executor can be exercised
//! without touching the host.

pub mod approval;
pub mod audit;
pub mod error;
pub mod executor;
pub mod probe;
pub mod remediation;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod tls;

pub use approval::{ApprovalWorkflow, ProposalStore};
pub use audit::AuditLog;
pub use error::{ApprovalError, RuleStoreError, RunError};
pub use executor::{CheckExecutor, RunOptions, RunRegistry};
pub use probe::{Probe, ProbeFactory, ProbeOutcome, SystemProbeFactory};
pub use remediation::{ActionRunner, RemediationEngine, RemediationOutcome, SystemActionRunner};
pub use report::ReportGenerator;
pub use scheduler::{RunSource, Scheduler};
pub use store::RuleStore;
pub use tls::{CertificateExpiry, StaticExpiry, TlsExpiryInspector};
