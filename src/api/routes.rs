use axum::{
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

use super::handlers::{
    hash, health, health_live, health_ready, issue_token, me, not_found, verify, AppState,
};
use super::openapi::ApiDoc;
use crate::metrics;

/// Demo application routes. Middleware is applied by [`super::server::Server`].
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        // Metrics endpoint (Prometheus)
        .route("/metrics", get(metrics::metrics_handler))
        // OpenAPI documentation
        .route("/api-docs/openapi.json", get(openapi_json))
        // Tokens
        .route("/api/auth/token", post(issue_token))
        .route("/api/auth/me", get(me))
        // Passwords
        .route("/api/passwords/hash", post(hash))
        .route("/api/passwords/verify", post(verify))
        .fallback(not_found)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
