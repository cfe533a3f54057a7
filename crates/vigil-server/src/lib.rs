//! Vigil Server - HTTP API for the compliance engine
//!
//! This crate provides:
//! - Compliance check trigger, status and report endpoints
//! - Approval workflow endpoints
//! - Health and metrics endpoints
//! - Authentication and request-logging middleware

pub mod api;
pub mod middleware;
pub mod state;

pub use api::create_router;
pub use state::{AppState, ScheduledRuns};
