//! Check executor: runs a compliance run's rules through their probes.
//!
//! Checks for independent rules run concurrently up to the configured pool
//! size; checks against the same target are serialized so probes with timing
//! side effects don't skew each other. Each scheduled rule yields exactly
//! one check result, and the run reaches a terminal status even when
//! individual probes error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock, Semaphore};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use vigil_core::check::{CheckResult, CheckStatus, ComplianceRun, RunStatus};
use vigil_core::config::CheckConfig;
use vigil_core::error::ProbeError;
use vigil_core::rule::{RemediationMode, Rule, Validation};

use crate::approval::ProposalStore;
use crate::audit::{self, AuditLog};
use crate::error::RunError;
use crate::probe::{ProbeFactory, ProbeOutcome};
use crate::remediation::RemediationEngine;
use crate::report::ReportGenerator;

/// Per-run options from the trigger request. Filters select the scope;
/// flag overrides replace the rules' own remediation posture.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub auto_fix: Option<bool>,
    pub require_approval: Option<bool>,
}

/// Tracks runs by check_id, with their cancellation channels.
pub struct RunRegistry {
    runs: RwLock<HashMap<String, RunEntry>>,
}

struct RunEntry {
    run: ComplianceRun,
    cancel_tx: watch::Sender<bool>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn create(&self, run: ComplianceRun) -> watch::Receiver<bool> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.runs
            .write()
            .await
            .insert(run.check_id.clone(), RunEntry { run, cancel_tx });
        cancel_rx
    }

    /// Record a failed run that never started (infrastructure fault).
    pub async fn create_failed(&self, check_id: &str, failure: &str) {
        let mut run = ComplianceRun::new(check_id.to_string(), 0);
        run.status = RunStatus::Failed;
        run.finished_at = Some(chrono::Utc::now());
        run.failure = Some(failure.to_string());
        self.create(run).await;
    }

    pub async fn get(&self, check_id: &str) -> Option<ComplianceRun> {
        self.runs
            .read()
            .await
            .get(check_id)
            .map(|entry| entry.run.clone())
    }

    pub async fn count(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Status counts across all recorded results, for metrics.
    pub async fn result_counts(&self) -> HashMap<CheckStatus, usize> {
        let mut counts = HashMap::new();
        for entry in self.runs.read().await.values() {
            for result in &entry.run.results {
                *counts.entry(result.status).or_insert(0) += 1;
            }
        }
        counts
    }

    async fn record(&self, check_id: &str, result: CheckResult) {
        if let Some(entry) = self.runs.write().await.get_mut(check_id) {
            entry.run.record(result);
        }
    }

    async fn set_status(&self, check_id: &str, status: RunStatus) {
        if let Some(entry) = self.runs.write().await.get_mut(check_id) {
            entry.run.status = status;
            if status.is_terminal() {
                entry.run.finished_at = Some(chrono::Utc::now());
            }
        }
    }

    /// Evict terminal runs that finished before `max_age` ago. Pending and
    /// running entries always survive; the persisted report is the archive
    /// for anything evicted here.
    pub async fn prune_terminal(&self, max_age: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - max_age;
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, entry| {
            !(entry.run.status.is_terminal()
                && entry.run.finished_at.is_some_and(|finished| finished < cutoff))
        });
        before - runs.len()
    }

    /// Request cancellation of an in-flight run. In-flight probes are
    /// abandoned at their next await point; collected results remain.
    pub async fn cancel(&self, check_id: &str) -> Result<(), RunError> {
        let runs = self.runs.read().await;
        let entry = runs
            .get(check_id)
            .ok_or_else(|| RunError::NotFound(check_id.to_string()))?;
        if entry.run.status.is_terminal() {
            return Err(RunError::AlreadyFinished(check_id.to_string()));
        }
        // Receivers may already be gone if the driver just finished.
        let _ = entry.cancel_tx.send(true);
        Ok(())
    }
}

/// Executes compliance runs.
pub struct CheckExecutor {
    checks: CheckConfig,
    probes: Arc<dyn ProbeFactory>,
    remediation: Arc<RemediationEngine>,
    proposals: Arc<ProposalStore>,
    reports: Arc<ReportGenerator>,
    audit: Arc<AuditLog>,
    registry: Arc<RunRegistry>,
    target_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CheckExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checks: CheckConfig,
        probes: Arc<dyn ProbeFactory>,
        remediation: Arc<RemediationEngine>,
        proposals: Arc<ProposalStore>,
        reports: Arc<ReportGenerator>,
        audit: Arc<AuditLog>,
        registry: Arc<RunRegistry>,
    ) -> Self {
        Self {
            checks,
            probes,
            remediation,
            proposals,
            reports,
            audit,
            registry,
            target_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> Arc<RunRegistry> {
        self.registry.clone()
    }

    /// Start a run over a rule snapshot. Returns the new check_id; the run
    /// itself proceeds in the background.
    pub async fn trigger(self: &Arc<Self>, rules: Arc<[Rule]>, options: RunOptions) -> String {
        let check_id = Uuid::new_v4().to_string();

        let mut run = ComplianceRun::new(check_id.clone(), rules.len());
        for rule in rules.iter() {
            run.rule_categories
                .insert(rule.rule_id.clone(), rule.category);
        }
        let cancel_rx = self.registry.create(run).await;

        let executor = self.clone();
        let id = check_id.clone();
        tokio::spawn(async move {
            executor.drive(&id, rules, options, cancel_rx).await;
        });

        check_id
    }

    #[instrument(skip(self, rules, options, cancel_rx), fields(check_id = %check_id))]
    async fn drive(
        self: Arc<Self>,
        check_id: &str,
        rules: Arc<[Rule]>,
        options: RunOptions,
        cancel_rx: watch::Receiver<bool>,
    ) {
        let start = std::time::Instant::now();
        self.registry.set_status(check_id, RunStatus::Running).await;
        info!(rules = rules.len(), "Compliance run started");
        self.audit
            .append(
                audit::RUN_STARTED,
                "executor",
                serde_json::json!({ "check_id": check_id, "rules": rules.len() }),
            )
            .await;

        let semaphore = Arc::new(Semaphore::new(self.checks.max_concurrent_checks.max(1)));
        let mut handles = Vec::with_capacity(rules.len());

        for rule in rules.iter().cloned() {
            let executor = self.clone();
            let check_id = check_id.to_string();
            let options = options.clone();
            let semaphore = semaphore.clone();
            let mut cancel = cancel_rx.clone();

            let rule_id = rule.rule_id.clone();
            let target = rule.target.clone();
            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if *cancel.borrow() {
                    return None;
                }

                // Same-target checks run one at a time.
                let target_lock = executor.target_lock(&rule.target).await;
                let _guard = target_lock.lock().await;

                tokio::select! {
                    result = executor.evaluate_rule(&check_id, &rule, &options) => Some(result),
                    _ = cancel.changed() => None,
                }
            });
            handles.push((rule_id, target, handle));
        }

        let mut cancelled = false;
        for (rule_id, target, handle) in handles {
            match handle.await {
                Ok(Some(result)) => self.registry.record(check_id, result).await,
                Ok(None) => cancelled = true,
                Err(e) => {
                    // A panicked check still yields a terminal result.
                    warn!(rule_id = %rule_id, error = %e, "Check task failed");
                    self.registry
                        .record(
                            check_id,
                            CheckResult {
                                rule_id,
                                target,
                                status: CheckStatus::Error,
                                message: format!("check task failed: {e}"),
                                remediated: None,
                                timestamp: chrono::Utc::now(),
                            },
                        )
                        .await;
                }
            }
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        self.registry.set_status(check_id, status).await;

        let event = if cancelled {
            audit::RUN_CANCELLED
        } else {
            audit::RUN_COMPLETED
        };
        self.audit
            .append(
                event,
                "executor",
                serde_json::json!({
                    "check_id": check_id,
                    "duration_ms": start.elapsed().as_millis() as u64,
                }),
            )
            .await;

        // Every run ends with a persisted report, even a cancelled one.
        if let Some(run) = self.registry.get(check_id).await {
            info!(
                status = ?run.status,
                passed = run.summary.passed,
                failed = run.summary.failed,
                errors = run.summary.errors,
                duration_ms = start.elapsed().as_millis() as u64,
                "Compliance run finished"
            );
            let proposals = self.proposals.list(Some(check_id)).await;
            let report = self.reports.generate(&run, &proposals).await;
            if let Err(e) = self.reports.persist(&report).await {
                warn!(error = %e, "Could not persist report");
            }
        }
    }

    /// Evaluate one rule: probe, then remediation dispatch on failure.
    async fn evaluate_rule(
        &self,
        check_id: &str,
        rule: &Rule,
        options: &RunOptions,
    ) -> CheckResult {
        let outcome = self.run_probe(&rule.validation).await;

        let mut result = match outcome {
            Ok(outcome) => CheckResult {
                rule_id: rule.rule_id.clone(),
                target: rule.target.clone(),
                status: outcome.status,
                message: outcome.message,
                remediated: None,
                timestamp: chrono::Utc::now(),
            },
            Err(probe_error) => CheckResult {
                rule_id: rule.rule_id.clone(),
                target: rule.target.clone(),
                status: CheckStatus::Error,
                message: probe_error.to_string(),
                remediated: None,
                timestamp: chrono::Utc::now(),
            },
        };

        if result.status == CheckStatus::Failed {
            let mode = effective_mode(rule, options);
            self.remediation
                .handle_failure(check_id, rule, mode, &mut result, || {
                    self.run_probe(&rule.validation)
                })
                .await;
        }

        result
    }

    /// Run one probe under the per-check timeout.
    async fn run_probe(&self, validation: &Validation) -> Result<ProbeOutcome, ProbeError> {
        let probe = self.probes.probe(validation);
        match tokio::time::timeout(
            Duration::from_millis(self.checks.check_timeout_ms),
            probe.evaluate(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    async fn target_lock(&self, target: &str) -> Arc<Mutex<()>> {
        let mut locks = self.target_locks.lock().await;
        locks
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Resolve the remediation mode for a rule under request-level overrides.
/// Approval still takes precedence when both flags end up set.
fn effective_mode(rule: &Rule, options: &RunOptions) -> RemediationMode {
    if rule.remediation.is_none() {
        return RemediationMode::None;
    }
    let auto_fix = options.auto_fix.unwrap_or(rule.auto_fix);
    let require_approval = options.require_approval.unwrap_or(rule.require_approval);
    if require_approval {
        RemediationMode::RequireApproval
    } else if auto_fix {
        RemediationMode::AutoFix
    } else {
        RemediationMode::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use vigil_core::proposal::ProposalStatus;
    use vigil_core::rule::{Category, Remediation, RemediationAction, Severity};

    use crate::probe::Probe;
    use crate::remediation::ActionRunner;

    // ── Stubs ───────────────────────────────────────────────────────────────

    /// Scripted probe outcomes per validation path; the last entry repeats.
    #[derive(Default)]
    struct StubFactory {
        scripts: StdMutex<HashMap<String, VecDeque<Result<ProbeOutcome, ProbeError>>>>,
    }

    impl StubFactory {
        fn script(
            self,
            key: &str,
            outcomes: Vec<Result<ProbeOutcome, ProbeError>>,
        ) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(key.to_string(), outcomes.into());
            self
        }
    }

    fn validation_key(validation: &Validation) -> String {
        match validation {
            Validation::FilePermission { path, .. } => path.clone(),
            Validation::ResponseTime { url, .. } => url.clone(),
            other => other.probe_type().to_string(),
        }
    }

    struct StubProbe {
        outcome: Result<ProbeOutcome, ProbeError>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Probe for StubProbe {
        async fn evaluate(&self) -> Result<ProbeOutcome, ProbeError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcome.clone()
        }
    }

    impl ProbeFactory for StubFactory {
        fn probe(&self, validation: &Validation) -> Box<dyn Probe> {
            let key = validation_key(validation);
            let mut scripts = self.scripts.lock().unwrap();
            let outcome = match scripts.get_mut(&key) {
                Some(queue) => {
                    if queue.len() > 1 {
                        queue.pop_front().unwrap()
                    } else {
                        queue.front().cloned().unwrap_or_else(|| {
                            Err(ProbeError::Io("script exhausted".to_string()))
                        })
                    }
                }
                None => Err(ProbeError::Unreachable(format!("no script for {key}"))),
            };
            let delay = if key == "slow" {
                Some(Duration::from_secs(5))
            } else {
                None
            };
            Box::new(StubProbe { outcome, delay })
        }
    }

    struct OkRunner;

    #[async_trait]
    impl ActionRunner for OkRunner {
        async fn apply(&self, _action: &RemediationAction) -> Result<(), String> {
            Ok(())
        }
    }

    fn rule(rule_id: &str, path: &str, auto_fix: bool, require_approval: bool) -> Rule {
        Rule {
            rule_id: rule_id.into(),
            rule_name: rule_id.into(),
            category: Category::Security,
            severity: Severity::High,
            description: String::new(),
            target: "filesystem-server".into(),
            validation: Validation::FilePermission {
                path: path.into(),
                expected_mode: "644".into(),
            },
            remediation: Some(Remediation {
                action: RemediationAction::Chmod {
                    path: path.into(),
                    mode: "644".into(),
                },
                description: String::new(),
            }),
            auto_fix,
            require_approval,
        }
    }

    struct Harness {
        executor: Arc<CheckExecutor>,
        proposals: Arc<ProposalStore>,
        _reports_dir: tempfile::TempDir,
    }

    fn harness(factory: StubFactory, timeout_ms: u64) -> Harness {
        let reports_dir = tempfile::tempdir().unwrap();
        let proposals = Arc::new(ProposalStore::new());
        let audit = Arc::new(AuditLog::disabled());
        let remediation = Arc::new(RemediationEngine::new(
            Arc::new(OkRunner),
            proposals.clone(),
            audit.clone(),
        ));
        let reports = Arc::new(ReportGenerator::new(reports_dir.path().to_path_buf(), 90));
        let executor = Arc::new(CheckExecutor::new(
            CheckConfig {
                max_concurrent_checks: 5,
                check_timeout_ms: timeout_ms,
            },
            Arc::new(factory),
            remediation,
            proposals.clone(),
            reports,
            audit,
            Arc::new(RunRegistry::new()),
        ));
        Harness {
            executor,
            proposals,
            _reports_dir: reports_dir,
        }
    }

    async fn wait_terminal(registry: &Arc<RunRegistry>, check_id: &str) -> ComplianceRun {
        for _ in 0..200 {
            let run = registry.get(check_id).await.unwrap();
            if run.status.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {check_id} never finished");
    }

    // ── Tests ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_one_result_per_rule_and_error_distinct_from_failed() {
        let factory = StubFactory::default()
            .script("/a", vec![Ok(ProbeOutcome::passed("ok"))])
            .script("/b", vec![Err(ProbeError::Unreachable("refused".into()))]);
        let h = harness(factory, 1000);

        let rules: Arc<[Rule]> = vec![
            rule("SEC-A", "/a", false, false),
            rule("SEC-B", "/b", false, false),
        ]
        .into();
        let check_id = h.executor.trigger(rules, RunOptions::default()).await;
        let run = wait_terminal(&h.executor.registry(), &check_id).await;

        // Unreachable target errors, but the run still completes.
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.results.len(), 2);
        assert_eq!(run.summary.passed, 1);
        assert_eq!(run.summary.errors, 1);
        assert_eq!(run.summary.failed, 0);
    }

    #[tokio::test]
    async fn test_auto_fix_reverifies_and_reports_remediated() {
        // First evaluation fails, post-fix re-check passes.
        let factory = StubFactory::default().script(
            "/opt/x",
            vec![
                Ok(ProbeOutcome::failed("mode 600, expected 644")),
                Ok(ProbeOutcome::passed("mode 644")),
            ],
        );
        let h = harness(factory, 1000);

        let rules: Arc<[Rule]> = vec![rule("SEC-001", "/opt/x", true, false)].into();
        let check_id = h.executor.trigger(rules, RunOptions::default()).await;
        let run = wait_terminal(&h.executor.registry(), &check_id).await;

        assert_eq!(run.summary.passed, 1);
        let result = &run.results[0];
        assert_eq!(result.status, CheckStatus::Passed);
        assert_eq!(result.remediated, Some(true));
        assert!(h.proposals.list(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_auto_fix_that_does_not_resolve_records_remediated_false() {
        let factory = StubFactory::default().script(
            "/opt/x",
            vec![Ok(ProbeOutcome::failed("mode 600, expected 644"))],
        );
        let h = harness(factory, 1000);

        let rules: Arc<[Rule]> = vec![rule("SEC-001", "/opt/x", true, false)].into();
        let check_id = h.executor.trigger(rules, RunOptions::default()).await;
        let run = wait_terminal(&h.executor.registry(), &check_id).await;

        let result = &run.results[0];
        assert_eq!(result.status, CheckStatus::Failed);
        assert_eq!(result.remediated, Some(false));
    }

    #[tokio::test]
    async fn test_approval_rule_stages_pending_proposal() {
        let factory = StubFactory::default().script(
            "/etc/cert",
            vec![Ok(ProbeOutcome::failed("expires in 10 days, threshold 30"))],
        );
        let h = harness(factory, 1000);

        let rules: Arc<[Rule]> = vec![rule("SEC-003", "/etc/cert", false, true)].into();
        let check_id = h.executor.trigger(rules, RunOptions::default()).await;
        let run = wait_terminal(&h.executor.registry(), &check_id).await;

        // Detection-time result stays failed; the proposal carries the trail.
        assert_eq!(run.results[0].status, CheckStatus::Failed);
        let proposals = h.proposals.list(Some(&check_id)).await;
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].status, ProposalStatus::Pending);
        assert_eq!(proposals[0].rule_id, "SEC-003");
    }

    #[tokio::test]
    async fn test_request_override_forces_approval_over_auto_fix() {
        let factory = StubFactory::default().script(
            "/opt/x",
            vec![Ok(ProbeOutcome::failed("mode 600"))],
        );
        let h = harness(factory, 1000);

        let rules: Arc<[Rule]> = vec![rule("SEC-001", "/opt/x", true, false)].into();
        let options = RunOptions {
            auto_fix: None,
            require_approval: Some(true),
        };
        let check_id = h.executor.trigger(rules, options).await;
        let run = wait_terminal(&h.executor.registry(), &check_id).await;

        assert_eq!(run.results[0].status, CheckStatus::Failed);
        assert!(run.results[0].remediated.is_none());
        assert_eq!(h.proposals.list(Some(&check_id)).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_error_with_timeout_reason() {
        // The "slow" script key sleeps for 5s; the timeout is 100ms.
        let factory = StubFactory::default()
            .script("slow", vec![Ok(ProbeOutcome::passed("never seen"))]);
        let h = harness(factory, 100);

        let mut slow_rule = rule("PERF-001", "unused", false, false);
        slow_rule.validation = Validation::ResponseTime {
            url: "slow".into(),
            max_time_ms: 10,
            warn_time_ms: None,
        };

        let rules: Arc<[Rule]> = vec![slow_rule].into();
        let check_id = h.executor.trigger(rules, RunOptions::default()).await;
        let run = wait_terminal(&h.executor.registry(), &check_id).await;

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].status, CheckStatus::Error);
        assert_eq!(run.results[0].message, "TIMEOUT");
    }

    #[tokio::test]
    async fn test_cancel_preserves_collected_results() {
        let factory = StubFactory::default()
            .script("/fast", vec![Ok(ProbeOutcome::passed("ok"))])
            .script("slow", vec![Ok(ProbeOutcome::passed("never seen"))]);
        let h = harness(factory, 60_000);

        let fast = rule("SEC-A", "/fast", false, false);
        let mut slow = rule("PERF-B", "unused", false, false);
        slow.validation = Validation::ResponseTime {
            url: "slow".into(),
            max_time_ms: 10,
            warn_time_ms: None,
        };
        slow.target = "other-target".into();

        let rules: Arc<[Rule]> = vec![fast, slow].into();
        let check_id = h.executor.trigger(rules, RunOptions::default()).await;
        let registry = h.executor.registry();

        // Let the fast check land, then cancel while the slow one sleeps.
        for _ in 0..200 {
            let run = registry.get(&check_id).await.unwrap();
            if run.progress.done >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        registry.cancel(&check_id).await.unwrap();

        let run = wait_terminal(&registry, &check_id).await;
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].rule_id, "SEC-A");
    }

    #[tokio::test]
    async fn test_idempotent_checks_against_unchanged_target() {
        let factory = StubFactory::default()
            .script("/a", vec![Ok(ProbeOutcome::passed("ok"))])
            .script("/b", vec![Ok(ProbeOutcome::failed("bad"))]);
        let h = harness(factory, 1000);

        let rules: Arc<[Rule]> = vec![
            rule("SEC-A", "/a", false, false),
            rule("SEC-B", "/b", false, false),
        ]
        .into();

        let first_id = h.executor.trigger(rules.clone(), RunOptions::default()).await;
        let first = wait_terminal(&h.executor.registry(), &first_id).await;
        let second_id = h.executor.trigger(rules, RunOptions::default()).await;
        let second = wait_terminal(&h.executor.registry(), &second_id).await;

        assert_eq!(first.summary, second.summary);
    }

    #[tokio::test]
    async fn test_prune_evicts_finished_runs_but_not_active_ones() {
        let factory = StubFactory::default().script("/a", vec![Ok(ProbeOutcome::passed("ok"))]);
        let h = harness(factory, 1000);
        let registry = h.executor.registry();

        let rules: Arc<[Rule]> = vec![rule("SEC-A", "/a", false, false)].into();
        let finished_id = h.executor.trigger(rules, RunOptions::default()).await;
        wait_terminal(&registry, &finished_id).await;

        // A run that never reaches a terminal status stays registered.
        let mut active = ComplianceRun::new("run-active".to_string(), 1);
        active.status = RunStatus::Running;
        registry.create(active).await;

        let removed = registry.prune_terminal(chrono::Duration::zero()).await;
        assert_eq!(removed, 1);
        assert!(registry.get(&finished_id).await.is_none());
        assert!(registry.get("run-active").await.is_some());
    }

    #[tokio::test]
    async fn test_cancel_unknown_run_is_not_found() {
        let h = harness(StubFactory::default(), 1000);
        let result = h.executor.registry().cancel("missing").await;
        assert!(matches!(result, Err(RunError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_rule_set_completes_immediately() {
        let h = harness(StubFactory::default(), 1000);
        let rules: Arc<[Rule]> = Vec::new().into();
        let check_id = h.executor.trigger(rules, RunOptions::default()).await;
        let run = wait_terminal(&h.executor.registry(), &check_id).await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.summary.total, 0);
    }
}
