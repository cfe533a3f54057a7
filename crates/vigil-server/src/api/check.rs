//! Check trigger, status and cancellation API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use vigil_core::check::{RunProgress, RunStatus, RunSummary};
use vigil_engine::{RunError, RunOptions};

use crate::state::AppState;

/// POST /compliance/check
pub async fn start_check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<(StatusCode, Json<CheckResponse>), ApiError> {
    let options = RunOptions {
        auto_fix: request.options.auto_fix,
        require_approval: request.options.require_approval,
    };
    let check_id = state
        .start_run(&request.targets, &request.rules, options)
        .await
        .map_err(ApiError::Internal)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CheckResponse {
            check_id,
            status: RunStatus::Running,
        }),
    ))
}

/// GET /compliance/status/:check_id
pub async fn check_status(
    State(state): State<AppState>,
    Path(check_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let run = state
        .registry
        .get(&check_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown check {check_id}")))?;

    Ok(Json(StatusResponse {
        check_id: run.check_id,
        status: run.status,
        progress: run.progress,
        summary: run.summary,
        failure: run.failure,
    }))
}

/// POST /compliance/cancel/:check_id
pub async fn cancel_check(
    State(state): State<AppState>,
    Path(check_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    state.registry.cancel(&check_id).await?;
    Ok(Json(CancelResponse {
        check_id,
        cancelled: true,
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct CheckRequest {
    /// Target filter; empty means all targets.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Rule-id filter; empty means all rules.
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub options: CheckOptions,
}

#[derive(Debug, Deserialize, Default)]
pub struct CheckOptions {
    pub auto_fix: Option<bool>,
    pub require_approval: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub check_id: String,
    pub status: RunStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub check_id: String,
    pub status: RunStatus,
    pub progress: RunProgress,
    pub summary: RunSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub check_id: String,
    pub cancelled: bool,
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": "api_error",
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<RunError> for ApiError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::NotFound(_) => ApiError::NotFound(e.to_string()),
            RunError::StillRunning(_) | RunError::AlreadyFinished(_) => {
                ApiError::Conflict(e.to_string())
            }
        }
    }
}
