//! Remediation proposals and the human approval trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::{RemediationAction, Severity};

/// State of a remediation proposal.
///
/// Legal transitions: `pending -> approved -> applied` and
/// `pending -> rejected`. Nothing skips `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
}

/// A recorded human decision on a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approver: String,
    pub reason: String,
    pub decided_at: DateTime<Utc>,
}

/// A staged remediation awaiting (or past) a human decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationProposal {
    pub proposal_id: String,
    pub check_id: String,
    pub rule_id: String,
    pub action: RemediationAction,
    pub risk: Severity,
    pub requires_approval: bool,
    pub status: ProposalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ApprovalDecision>,
    /// Failure note when an approved action did not apply cleanly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RemediationProposal {
    pub fn new(check_id: String, rule_id: String, action: RemediationAction, risk: Severity) -> Self {
        Self {
            proposal_id: uuid::Uuid::new_v4().to_string(),
            check_id,
            rule_id,
            action,
            risk,
            requires_approval: true,
            status: ProposalStatus::Pending,
            decision: None,
            failure: None,
            created_at: Utc::now(),
        }
    }
}
