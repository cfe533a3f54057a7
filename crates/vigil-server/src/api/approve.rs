//! Approval and rejection API

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::proposal::RemediationProposal;

use crate::api::check::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// When set, every proposal must belong to this run.
    pub check_id: Option<String>,
    pub actions: Vec<String>,
    pub approver: String,
    #[serde(default)]
    pub reason: String,
}

/// Approve and reject share one response shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// Proposal ids that transitioned.
    pub approved_actions: Vec<String>,
    /// Proposals that could not transition, reported per id.
    pub failed_actions: Vec<ActionFailure>,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionFailure {
    pub proposal_id: String,
    pub error: String,
}

/// POST /compliance/approve
pub async fn approve_actions(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    decide(state, request, Decision::Approve).await
}

/// POST /compliance/reject
pub async fn reject_actions(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    decide(state, request, Decision::Reject).await
}

enum Decision {
    Approve,
    Reject,
}

/// One invalid proposal never aborts the batch; each failure is reported
/// against its id.
async fn decide(
    state: AppState,
    request: DecisionRequest,
    decision: Decision,
) -> Result<Json<DecisionResponse>, ApiError> {
    if request.actions.is_empty() {
        return Err(ApiError::BadRequest("actions must not be empty".into()));
    }
    if request.approver.trim().is_empty() {
        return Err(ApiError::BadRequest("approver must not be empty".into()));
    }

    let mut approved_actions = Vec::new();
    let mut failed_actions = Vec::new();

    for proposal_id in &request.actions {
        if let Some(check_id) = &request.check_id {
            match state.proposals.get(proposal_id).await {
                Some(proposal) if &proposal.check_id != check_id => {
                    failed_actions.push(ActionFailure {
                        proposal_id: proposal_id.clone(),
                        error: format!("proposal does not belong to check {check_id}"),
                    });
                    continue;
                }
                _ => {}
            }
        }

        let result = match decision {
            Decision::Approve => {
                state
                    .approvals
                    .approve(proposal_id, &request.approver, &request.reason)
                    .await
            }
            Decision::Reject => {
                state
                    .approvals
                    .reject(proposal_id, &request.approver, &request.reason)
                    .await
            }
        };

        match result {
            Ok(_) => approved_actions.push(proposal_id.clone()),
            Err(e) => failed_actions.push(ActionFailure {
                proposal_id: proposal_id.clone(),
                error: e.to_string(),
            }),
        }
    }

    Ok(Json(DecisionResponse {
        approved_actions,
        failed_actions,
        approved_by: request.approver,
        approved_at: Utc::now(),
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct ProposalsQuery {
    pub check_id: Option<String>,
}

/// GET /compliance/proposals?check_id=
pub async fn list_proposals(
    State(state): State<AppState>,
    Query(query): Query<ProposalsQuery>,
) -> Json<Vec<RemediationProposal>> {
    Json(state.proposals.list(query.check_id.as_deref()).await)
}
