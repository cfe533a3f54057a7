//! Authentication middleware

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use vigil_core::config::ServerConfig;

/// Bearer-token authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Valid API keys
    pub api_keys: HashSet<String>,
    /// Allow unauthenticated requests
    pub allow_anonymous: bool,
}

impl AuthConfig {
    /// No configured keys means an open, anonymous deployment.
    pub fn from_server(config: &ServerConfig) -> Self {
        let api_keys: HashSet<String> = config.api_keys.iter().cloned().collect();
        Self {
            allow_anonymous: api_keys.is_empty(),
            api_keys,
        }
    }
}

/// Middleware function for bearer-token authentication.
pub async fn require_bearer(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Health endpoints stay reachable for liveness probes.
    let path = request.uri().path();
    if path == "/health" || path == "/metrics" {
        return Ok(next.run(request).await);
    }

    if auth.allow_anonymous {
        return Ok(next.run(request).await);
    }

    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(api_key) = auth_str.strip_prefix("Bearer ") {
                if auth.api_keys.contains(api_key) {
                    return Ok(next.run(request).await);
                }
            }
        }
    }

    Err(StatusCode::UNAUTHORIZED)
}
