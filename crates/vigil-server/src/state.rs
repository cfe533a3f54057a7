//! Application state

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;
use vigil_core::config::{EnvSnapshot, VigilConfig};
use vigil_engine::{
    ActionRunner, ApprovalWorkflow, AuditLog, CheckExecutor, ProbeFactory, ProposalStore,
    RemediationEngine, ReportGenerator, RuleStore, RunOptions, RunRegistry, RunSource,
    SystemActionRunner, SystemProbeFactory, TlsExpiryInspector,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<VigilConfig>,
    pub executor: Arc<CheckExecutor>,
    pub registry: Arc<RunRegistry>,
    pub proposals: Arc<ProposalStore>,
    pub approvals: Arc<ApprovalWorkflow>,
    pub reports: Arc<ReportGenerator>,
    pub audit: Arc<AuditLog>,
}

impl AppState {
    /// Production wiring: system probes and the system action runner.
    pub fn new(config: VigilConfig) -> Self {
        let probes = Arc::new(SystemProbeFactory::new(
            EnvSnapshot::capture(),
            Arc::new(TlsExpiryInspector::new(Duration::from_secs(10))),
            Duration::from_millis(config.checks.check_timeout_ms),
        ));
        Self::with_components(config, probes, Arc::new(SystemActionRunner))
    }

    /// Wiring with substituted probes and action runner, for tests.
    pub fn with_components(
        config: VigilConfig,
        probes: Arc<dyn ProbeFactory>,
        runner: Arc<dyn ActionRunner>,
    ) -> Self {
        let audit = Arc::new(AuditLog::new(config.audit.clone()));
        let proposals = Arc::new(ProposalStore::new());
        let remediation = Arc::new(RemediationEngine::new(
            runner.clone(),
            proposals.clone(),
            audit.clone(),
        ));
        let approvals = Arc::new(ApprovalWorkflow::new(
            proposals.clone(),
            runner,
            audit.clone(),
        ));
        let reports = Arc::new(ReportGenerator::new(
            config.storage.reports_dir.clone(),
            config.storage.report_retention_days,
        ));
        let registry = Arc::new(RunRegistry::new());
        let executor = Arc::new(CheckExecutor::new(
            config.checks.clone(),
            probes,
            remediation,
            proposals.clone(),
            reports.clone(),
            audit.clone(),
            registry.clone(),
        ));

        Self {
            config: Arc::new(config),
            executor,
            registry,
            proposals,
            approvals,
            reports,
            audit,
        }
    }

    /// Load a fresh rule snapshot and start a run over it. Each trigger
    /// re-reads the rules directory; in-flight runs keep their own snapshot.
    pub async fn start_run(
        &self,
        targets: &[String],
        rule_ids: &[String],
        options: RunOptions,
    ) -> Result<String, String> {
        let store = match RuleStore::load(&self.config.storage.rules_dir) {
            Ok(store) => store,
            Err(e) => {
                // Rule storage unreadable is the one fault that fails a run.
                error!(error = %e, "Rule store unreadable, recording failed run");
                let check_id = Uuid::new_v4().to_string();
                self.registry
                    .create_failed(&check_id, &e.to_string())
                    .await;
                return Err(e.to_string());
            }
        };
        let rules = store.snapshot(targets, rule_ids);
        Ok(self.executor.trigger(rules, options).await)
    }
}

/// Scheduler trigger: every scheduled run covers the full rule set.
pub struct ScheduledRuns {
    state: AppState,
}

impl ScheduledRuns {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl RunSource for ScheduledRuns {
    async fn start_run(&self) -> Result<String, String> {
        self.state.start_run(&[], &[], RunOptions::default()).await
    }
}
