//! Report API

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use vigil_engine::RunError;

use crate::api::check::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ReportQuery {
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

/// GET /compliance/report/:check_id?format=json|text
pub async fn get_report(
    State(state): State<AppState>,
    Path(check_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let run = state
        .registry
        .get(&check_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown check {check_id}")))?;

    if !run.status.is_terminal() {
        return Err(RunError::StillRunning(check_id).into());
    }

    let proposals = state.proposals.list(Some(&check_id)).await;
    let report = state.reports.generate(&run, &proposals).await;

    let response = match query.format {
        ReportFormat::Json => Json(report).into_response(),
        ReportFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            report.to_text(),
        )
            .into_response(),
    };
    Ok(response)
}
