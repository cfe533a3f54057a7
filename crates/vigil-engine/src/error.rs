//! Engine error types.

use thiserror::Error;
use vigil_core::proposal::ProposalStatus;

/// Errors from the rule store. I/O faults are fatal to a load; malformed
/// rule content is not (it is captured per rule instead).
#[derive(Debug, Error)]
pub enum RuleStoreError {
    /// The rules directory or a rule file could not be read.
    #[error("rule store unreadable: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the approval workflow.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("proposal not found: {0}")]
    NotFound(String),

    /// Illegal state transition on a proposal.
    #[error("invalid state: proposal {proposal_id} is {current:?}, expected {expected:?}")]
    InvalidState {
        proposal_id: String,
        current: ProposalStatus,
        expected: ProposalStatus,
    },
}

/// Errors from triggering or querying runs.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run not found: {0}")]
    NotFound(String),

    #[error("run {0} is still running")]
    StillRunning(String),

    #[error("run {0} already finished")]
    AlreadyFinished(String),
}
