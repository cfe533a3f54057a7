//! Health and metrics endpoints

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use vigil_core::check::CheckStatus;

use crate::state::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        runs: state.registry.count().await,
        pending_proposals: state.proposals.pending_count().await,
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    let runs = state.registry.count().await;
    let checks = state.registry.result_counts().await;
    let pending = state.proposals.pending_count().await;

    let by_status = |status: CheckStatus| checks.get(&status).copied().unwrap_or(0);

    // Prometheus format
    format!(
        r#"# HELP vigil_runs_total Compliance runs recorded
# TYPE vigil_runs_total counter
vigil_runs_total {}

# HELP vigil_checks_total Check results by status
# TYPE vigil_checks_total counter
vigil_checks_total{{status="passed"}} {}
vigil_checks_total{{status="failed"}} {}
vigil_checks_total{{status="warning"}} {}
vigil_checks_total{{status="error"}} {}

# HELP vigil_proposals_pending Remediation proposals awaiting a decision
# TYPE vigil_proposals_pending gauge
vigil_proposals_pending {}
"#,
        runs,
        by_status(CheckStatus::Passed),
        by_status(CheckStatus::Failed),
        by_status(CheckStatus::Warning),
        by_status(CheckStatus::Error),
        pending
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub runs: usize,
    pub pending_proposals: usize,
}
