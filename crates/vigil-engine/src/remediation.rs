//! Remediation engine: auto-fix with re-verification, or proposal staging.
//!
//! Remediation actions are a closed set of typed operations; nothing here
//! interpolates shell strings. Auto-fix failures are reported, never retried
//! automatically.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use vigil_core::check::{CheckResult, CheckStatus};
use vigil_core::error::ProbeError;
use vigil_core::proposal::RemediationProposal;
use vigil_core::rule::{RemediationAction, RemediationMode, Rule};

use crate::approval::ProposalStore;
use crate::audit::{self, AuditLog};
use crate::probe::ProbeOutcome;

/// Applies a typed remediation action. The production runner touches the
/// host; tests substitute a recording stub.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn apply(&self, action: &RemediationAction) -> Result<(), String>;
}

/// Production action runner.
pub struct SystemActionRunner;

#[async_trait]
impl ActionRunner for SystemActionRunner {
    async fn apply(&self, action: &RemediationAction) -> Result<(), String> {
        match action {
            RemediationAction::Chmod { path, mode } => {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;

                    let mode = u32::from_str_radix(mode, 8)
                        .map_err(|_| format!("invalid mode {mode}"))?;
                    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                        .await
                        .map_err(|e| format!("chmod {path}: {e}"))
                }
                #[cfg(not(unix))]
                {
                    let _ = (path, mode);
                    Err("chmod requires a unix host".to_string())
                }
            }
            RemediationAction::RestartService { unit } => {
                run_command("systemctl", &["restart".to_string(), unit.clone()]).await
            }
            RemediationAction::RenewCertificate { host } => {
                run_command(
                    "certbot",
                    &[
                        "renew".to_string(),
                        "--cert-name".to_string(),
                        host.clone(),
                        "--non-interactive".to_string(),
                    ],
                )
                .await
            }
            RemediationAction::RunCommand { program, args } => run_command(program, args).await,
        }
    }
}

/// Run a program with an argv vector; never goes through a shell.
async fn run_command(program: &str, args: &[String]) -> Result<(), String> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| format!("{program}: {e}"))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        ))
    }
}

/// Outcome of dispatching a failed check through the remediation engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RemediationOutcome {
    /// No remediation configured for the rule.
    NotConfigured,
    /// Auto-fix applied and the re-check passed.
    Fixed,
    /// Auto-fix was attempted but the condition still fails (or the action
    /// itself failed); details are on the check result.
    FixFailed,
    /// A proposal was staged for human approval.
    Staged(String),
}

/// Dispatches failed checks to auto-fix or the approval queue.
pub struct RemediationEngine {
    runner: Arc<dyn ActionRunner>,
    proposals: Arc<ProposalStore>,
    audit: Arc<AuditLog>,
}

impl RemediationEngine {
    pub fn new(
        runner: Arc<dyn ActionRunner>,
        proposals: Arc<ProposalStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            runner,
            proposals,
            audit,
        }
    }

    /// Handle a failed check. `recheck` re-evaluates the single rule so an
    /// auto-fix is never reported as passed without verification.
    pub async fn handle_failure<F, Fut>(
        &self,
        check_id: &str,
        rule: &Rule,
        mode: RemediationMode,
        result: &mut CheckResult,
        recheck: F,
    ) -> RemediationOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProbeOutcome, ProbeError>>,
    {
        let Some(remediation) = &rule.remediation else {
            return RemediationOutcome::NotConfigured;
        };

        match mode {
            RemediationMode::None => RemediationOutcome::NotConfigured,
            RemediationMode::AutoFix => {
                self.auto_fix(check_id, rule, &remediation.action, result, recheck)
                    .await
            }
            RemediationMode::RequireApproval => {
                let proposal = RemediationProposal::new(
                    check_id.to_string(),
                    rule.rule_id.clone(),
                    remediation.action.clone(),
                    rule.severity,
                );
                let proposal_id = proposal.proposal_id.clone();
                self.proposals.insert(proposal).await;
                info!(
                    check_id,
                    rule_id = %rule.rule_id,
                    proposal_id = %proposal_id,
                    "Remediation staged for approval"
                );
                self.audit
                    .append(
                        audit::PROPOSAL_CREATED,
                        "engine",
                        serde_json::json!({
                            "check_id": check_id,
                            "rule_id": rule.rule_id,
                            "proposal_id": proposal_id,
                        }),
                    )
                    .await;
                RemediationOutcome::Staged(proposal_id)
            }
        }
    }

    async fn auto_fix<F, Fut>(
        &self,
        check_id: &str,
        rule: &Rule,
        action: &RemediationAction,
        result: &mut CheckResult,
        recheck: F,
    ) -> RemediationOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProbeOutcome, ProbeError>>,
    {
        if let Err(apply_error) = self.runner.apply(action).await {
            warn!(
                check_id,
                rule_id = %rule.rule_id,
                error = %apply_error,
                "Auto-fix action failed"
            );
            result.remediated = Some(false);
            result.message = format!("{}; auto-fix failed: {apply_error}", result.message);
            return RemediationOutcome::FixFailed;
        }

        self.audit
            .append(
                audit::REMEDIATION_APPLIED,
                "engine",
                serde_json::json!({
                    "check_id": check_id,
                    "rule_id": rule.rule_id,
                    "action": action.describe(),
                    "mode": "auto_fix",
                }),
            )
            .await;

        // Re-verify before claiming success.
        match recheck().await {
            Ok(outcome) if outcome.status == CheckStatus::Passed => {
                info!(check_id, rule_id = %rule.rule_id, "Auto-fix verified");
                result.status = CheckStatus::Passed;
                result.remediated = Some(true);
                result.message = format!("{} (auto-fixed: {})", outcome.message, action.describe());
                RemediationOutcome::Fixed
            }
            Ok(outcome) => {
                warn!(check_id, rule_id = %rule.rule_id, "Auto-fix did not resolve the check");
                result.remediated = Some(false);
                result.message =
                    format!("{}; still failing after auto-fix", outcome.message);
                RemediationOutcome::FixFailed
            }
            Err(probe_error) => {
                warn!(
                    check_id,
                    rule_id = %rule.rule_id,
                    error = %probe_error,
                    "Re-check after auto-fix errored"
                );
                result.remediated = Some(false);
                result.message = format!(
                    "{}; re-check after auto-fix errored: {probe_error}",
                    result.message
                );
                RemediationOutcome::FixFailed
            }
        }
    }
}
