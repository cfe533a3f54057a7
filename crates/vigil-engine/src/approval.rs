//! Approval workflow: the human gate between a staged remediation and its
//! execution.
//!
//! Proposal state machine: `pending -> approved -> applied`, or
//! `pending -> rejected`. Every transition is checked and written under one
//! write lock, so there is a single writer per proposal and `applied` is
//! unreachable without a recorded approval.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use vigil_core::proposal::{ApprovalDecision, ProposalStatus, RemediationProposal};

use crate::audit::{self, AuditLog};
use crate::error::ApprovalError;
use crate::remediation::ActionRunner;

/// In-memory store of remediation proposals.
pub struct ProposalStore {
    proposals: RwLock<HashMap<String, RemediationProposal>>,
}

impl Default for ProposalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalStore {
    pub fn new() -> Self {
        Self {
            proposals: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, proposal: RemediationProposal) {
        self.proposals
            .write()
            .await
            .insert(proposal.proposal_id.clone(), proposal);
    }

    pub async fn get(&self, proposal_id: &str) -> Option<RemediationProposal> {
        self.proposals.read().await.get(proposal_id).cloned()
    }

    /// List proposals, optionally scoped to one run.
    pub async fn list(&self, check_id: Option<&str>) -> Vec<RemediationProposal> {
        let mut proposals: Vec<_> = self
            .proposals
            .read()
            .await
            .values()
            .filter(|p| check_id.is_none_or(|id| p.check_id == id))
            .cloned()
            .collect();
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        proposals
    }

    pub async fn pending_count(&self) -> usize {
        self.proposals
            .read()
            .await
            .values()
            .filter(|p| p.status == ProposalStatus::Pending)
            .count()
    }

    /// Evict terminal proposals decided before `max_age` ago. `pending`
    /// proposals still await a human and `approved` ones still belong to the
    /// runner, so only `rejected` and `applied` are eligible.
    pub async fn prune_terminal(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut proposals = self.proposals.write().await;
        let before = proposals.len();
        proposals.retain(|_, p| {
            let terminal =
                matches!(p.status, ProposalStatus::Rejected | ProposalStatus::Applied);
            let decided_at = p
                .decision
                .as_ref()
                .map(|d| d.decided_at)
                .unwrap_or(p.created_at);
            !(terminal && decided_at < cutoff)
        });
        before - proposals.len()
    }

    /// `pending -> approved`, recording the decision.
    pub async fn approve(
        &self,
        proposal_id: &str,
        approver: &str,
        reason: &str,
    ) -> Result<RemediationProposal, ApprovalError> {
        self.transition(proposal_id, ProposalStatus::Pending, |proposal| {
            proposal.status = ProposalStatus::Approved;
            proposal.decision = Some(ApprovalDecision {
                approver: approver.to_string(),
                reason: reason.to_string(),
                decided_at: Utc::now(),
            });
        })
        .await
    }

    /// `pending -> rejected` (terminal), recording the decision.
    pub async fn reject(
        &self,
        proposal_id: &str,
        approver: &str,
        reason: &str,
    ) -> Result<RemediationProposal, ApprovalError> {
        self.transition(proposal_id, ProposalStatus::Pending, |proposal| {
            proposal.status = ProposalStatus::Rejected;
            proposal.decision = Some(ApprovalDecision {
                approver: approver.to_string(),
                reason: reason.to_string(),
                decided_at: Utc::now(),
            });
        })
        .await
    }

    /// `approved -> applied`.
    pub async fn mark_applied(
        &self,
        proposal_id: &str,
    ) -> Result<RemediationProposal, ApprovalError> {
        self.transition(proposal_id, ProposalStatus::Approved, |proposal| {
            proposal.status = ProposalStatus::Applied;
        })
        .await
    }

    /// The action errored after approval: the proposal stays `approved` with
    /// a failure note so retrying remains a human decision.
    pub async fn mark_apply_failed(
        &self,
        proposal_id: &str,
        failure: &str,
    ) -> Result<RemediationProposal, ApprovalError> {
        self.transition(proposal_id, ProposalStatus::Approved, |proposal| {
            proposal.failure = Some(failure.to_string());
        })
        .await
    }

    /// Check-and-set under one write lock.
    async fn transition(
        &self,
        proposal_id: &str,
        expected: ProposalStatus,
        mutate: impl FnOnce(&mut RemediationProposal),
    ) -> Result<RemediationProposal, ApprovalError> {
        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(proposal_id)
            .ok_or_else(|| ApprovalError::NotFound(proposal_id.to_string()))?;

        if proposal.status != expected {
            return Err(ApprovalError::InvalidState {
                proposal_id: proposal_id.to_string(),
                current: proposal.status,
                expected,
            });
        }

        mutate(proposal);
        Ok(proposal.clone())
    }
}

/// Drives approved proposals through asynchronous application.
pub struct ApprovalWorkflow {
    proposals: Arc<ProposalStore>,
    runner: Arc<dyn ActionRunner>,
    audit: Arc<AuditLog>,
}

impl ApprovalWorkflow {
    pub fn new(
        proposals: Arc<ProposalStore>,
        runner: Arc<dyn ActionRunner>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            proposals,
            runner,
            audit,
        }
    }

    pub fn proposals(&self) -> Arc<ProposalStore> {
        self.proposals.clone()
    }

    /// Approve a proposal and apply its action in the background. Returns
    /// the proposal as of the approval; application status lands later.
    pub async fn approve(
        &self,
        proposal_id: &str,
        approver: &str,
        reason: &str,
    ) -> Result<RemediationProposal, ApprovalError> {
        let proposal = self.proposals.approve(proposal_id, approver, reason).await?;
        info!(proposal_id, approver, "Proposal approved");
        self.audit
            .append(
                audit::PROPOSAL_APPROVED,
                approver,
                serde_json::json!({
                    "proposal_id": proposal_id,
                    "check_id": proposal.check_id,
                    "rule_id": proposal.rule_id,
                    "reason": reason,
                }),
            )
            .await;

        let proposals = self.proposals.clone();
        let runner = self.runner.clone();
        let audit_log = self.audit.clone();
        let action = proposal.action.clone();
        let id = proposal.proposal_id.clone();
        tokio::spawn(async move {
            match runner.apply(&action).await {
                Ok(()) => {
                    if let Err(e) = proposals.mark_applied(&id).await {
                        warn!(proposal_id = %id, error = %e, "Could not mark proposal applied");
                        return;
                    }
                    info!(proposal_id = %id, "Approved remediation applied");
                    audit_log
                        .append(
                            audit::PROPOSAL_APPLIED,
                            "engine",
                            serde_json::json!({ "proposal_id": id }),
                        )
                        .await;
                }
                Err(failure) => {
                    warn!(proposal_id = %id, error = %failure, "Approved remediation failed");
                    let _ = proposals.mark_apply_failed(&id, &failure).await;
                    audit_log
                        .append(
                            audit::PROPOSAL_APPLY_FAILED,
                            "engine",
                            serde_json::json!({ "proposal_id": id, "error": failure }),
                        )
                        .await;
                }
            }
        });

        Ok(proposal)
    }

    /// Reject a pending proposal. Terminal; nothing is applied.
    pub async fn reject(
        &self,
        proposal_id: &str,
        approver: &str,
        reason: &str,
    ) -> Result<RemediationProposal, ApprovalError> {
        let proposal = self.proposals.reject(proposal_id, approver, reason).await?;
        info!(proposal_id, approver, "Proposal rejected");
        self.audit
            .append(
                audit::PROPOSAL_REJECTED,
                approver,
                serde_json::json!({ "proposal_id": proposal_id, "reason": reason }),
            )
            .await;
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vigil_core::rule::{RemediationAction, Severity};

    struct CountingRunner {
        applied: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ActionRunner for CountingRunner {
        async fn apply(&self, _action: &RemediationAction) -> Result<(), String> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("unit not found".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn proposal() -> RemediationProposal {
        RemediationProposal::new(
            "c-1".into(),
            "SEC-003".into(),
            RemediationAction::RenewCertificate {
                host: "example.com".into(),
            },
            Severity::High,
        )
    }

    async fn wait_for_status(
        store: &ProposalStore,
        id: &str,
        status: ProposalStatus,
    ) -> RemediationProposal {
        for _ in 0..50 {
            let current = store.get(id).await.unwrap();
            if current.status == status {
                return current;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("proposal {id} never reached {status:?}");
    }

    #[tokio::test]
    async fn test_approve_then_apply() {
        let store = Arc::new(ProposalStore::new());
        let runner = Arc::new(CountingRunner {
            applied: AtomicUsize::new(0),
            fail: false,
        });
        let workflow =
            ApprovalWorkflow::new(store.clone(), runner.clone(), Arc::new(AuditLog::disabled()));

        let p = proposal();
        let id = p.proposal_id.clone();
        store.insert(p).await;

        let approved = workflow.approve(&id, "alice", "expiry confirmed").await.unwrap();
        assert_eq!(approved.status, ProposalStatus::Approved);
        assert_eq!(approved.decision.as_ref().unwrap().approver, "alice");

        let applied = wait_for_status(&store, &id, ProposalStatus::Applied).await;
        assert!(applied.failure.is_none());
        assert_eq!(runner.applied.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_applied_unreachable_without_approval() {
        let store = ProposalStore::new();
        let p = proposal();
        let id = p.proposal_id.clone();
        store.insert(p).await;

        // pending -> applied must be rejected.
        let result = store.mark_applied(&id).await;
        assert!(matches!(result, Err(ApprovalError::InvalidState { .. })));
        assert_eq!(store.get(&id).await.unwrap().status, ProposalStatus::Pending);
    }

    #[tokio::test]
    async fn test_reject_is_terminal() {
        let store = Arc::new(ProposalStore::new());
        let runner = Arc::new(CountingRunner {
            applied: AtomicUsize::new(0),
            fail: false,
        });
        let workflow =
            ApprovalWorkflow::new(store.clone(), runner.clone(), Arc::new(AuditLog::disabled()));

        let p = proposal();
        let id = p.proposal_id.clone();
        store.insert(p).await;

        workflow.reject(&id, "bob", "renewal scheduled elsewhere").await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().status, ProposalStatus::Rejected);

        // Neither approval nor application is possible afterwards.
        assert!(matches!(
            workflow.approve(&id, "alice", "late").await,
            Err(ApprovalError::InvalidState { .. })
        ));
        assert!(matches!(
            store.mark_applied(&id).await,
            Err(ApprovalError::InvalidState { .. })
        ));
        assert_eq!(runner.applied.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_double_approve_fails_invalid_state() {
        let store = Arc::new(ProposalStore::new());
        let workflow = ApprovalWorkflow::new(
            store.clone(),
            Arc::new(CountingRunner {
                applied: AtomicUsize::new(0),
                fail: false,
            }),
            Arc::new(AuditLog::disabled()),
        );

        let p = proposal();
        let id = p.proposal_id.clone();
        store.insert(p).await;

        workflow.approve(&id, "alice", "ok").await.unwrap();
        let second = workflow.approve(&id, "carol", "me too").await;
        assert!(matches!(second, Err(ApprovalError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_apply_failure_keeps_approved_with_note() {
        let store = Arc::new(ProposalStore::new());
        let workflow = ApprovalWorkflow::new(
            store.clone(),
            Arc::new(CountingRunner {
                applied: AtomicUsize::new(0),
                fail: true,
            }),
            Arc::new(AuditLog::disabled()),
        );

        let p = proposal();
        let id = p.proposal_id.clone();
        store.insert(p).await;

        workflow.approve(&id, "alice", "ok").await.unwrap();

        // Stays approved; failure note lands asynchronously.
        for _ in 0..50 {
            let current = store.get(&id).await.unwrap();
            if current.failure.is_some() {
                assert_eq!(current.status, ProposalStatus::Approved);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("failure note never recorded");
    }

    #[tokio::test]
    async fn test_unknown_proposal_not_found() {
        let store = ProposalStore::new();
        assert!(matches!(
            store.approve("nope", "alice", "x").await,
            Err(ApprovalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_prune_evicts_only_decided_terminal_proposals() {
        let store = Arc::new(ProposalStore::new());
        let workflow = ApprovalWorkflow::new(
            store.clone(),
            Arc::new(CountingRunner {
                applied: AtomicUsize::new(0),
                fail: false,
            }),
            Arc::new(AuditLog::disabled()),
        );

        let pending = proposal();
        let pending_id = pending.proposal_id.clone();
        let rejected = proposal();
        let rejected_id = rejected.proposal_id.clone();
        let applied = proposal();
        let applied_id = applied.proposal_id.clone();
        store.insert(pending).await;
        store.insert(rejected).await;
        store.insert(applied).await;

        workflow.reject(&rejected_id, "bob", "not needed").await.unwrap();
        workflow.approve(&applied_id, "alice", "ok").await.unwrap();
        wait_for_status(&store, &applied_id, ProposalStatus::Applied).await;

        // Zero max age: every decided terminal proposal is already expired.
        let removed = store.prune_terminal(chrono::Duration::zero()).await;
        assert_eq!(removed, 2);
        assert!(store.get(&pending_id).await.is_some());
        assert!(store.get(&rejected_id).await.is_none());
        assert!(store.get(&applied_id).await.is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_recent_terminal_proposals() {
        let store = ProposalStore::new();
        let p = proposal();
        let id = p.proposal_id.clone();
        store.insert(p).await;
        store.reject(&id, "bob", "duplicate").await.unwrap();

        let removed = store.prune_terminal(chrono::Duration::hours(1)).await;
        assert_eq!(removed, 0);
        assert!(store.get(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_list_scoped_to_check_id() {
        let store = ProposalStore::new();
        let mut a = proposal();
        a.check_id = "c-1".into();
        let mut b = proposal();
        b.check_id = "c-2".into();
        store.insert(a).await;
        store.insert(b).await;

        assert_eq!(store.list(Some("c-1")).await.len(), 1);
        assert_eq!(store.list(None).await.len(), 2);
        assert_eq!(store.pending_count().await, 2);
    }
}
