//! API routes

pub mod approve;
pub mod check;
pub mod health;
pub mod report;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use crate::middleware::{auth, logging, AuthConfig};
use crate::state::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let auth_config = AuthConfig::from_server(&state.config.server);

    Router::new()
        // Compliance endpoints
        .route("/compliance/check", post(check::start_check))
        .route("/compliance/status/:check_id", get(check::check_status))
        .route("/compliance/cancel/:check_id", post(check::cancel_check))
        .route("/compliance/report/:check_id", get(report::get_report))
        // Approval endpoints
        .route("/compliance/approve", post(approve::approve_actions))
        .route("/compliance/reject", post(approve::reject_actions))
        .route("/compliance/proposals", get(approve::list_proposals))
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .layer(axum_middleware::from_fn(logging::logging_middleware))
        .layer(axum_middleware::from_fn_with_state(
            auth_config,
            auth::require_bearer,
        ))
        .with_state(state)
}
