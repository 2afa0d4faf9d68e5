use axum::{
    extract::{FromRef, State},
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use utoipa::ToSchema;

use super::extract::{JwtClaims, JwtSecret, ValidatedJson};
use super::responder::Responder;
use crate::auth::{compare_password, generate_token, hash_password, Claims};
use crate::db::{check_all, Probe, ProbeStatus};
use crate::errors::Exception;
use crate::validation::{Rule, Schema, Validate};

lazy_static::lazy_static! {
    static ref START_TIME: Instant = Instant::now();

    static ref TOKEN_REQUEST: Schema = Schema::new()
        .labeled("subject", "Subject", &[Rule::Required, Rule::Min(3.0), Rule::Max(64.0)])
        .labeled("email", "Email", &[Rule::Required, Rule::Email]);

    static ref HASH_REQUEST: Schema = Schema::new()
        // bcrypt ignores everything past 72 bytes
        .labeled("password", "Password", &[Rule::Required, Rule::Min(8.0), Rule::Max(72.0)]);

    static ref VERIFY_REQUEST: Schema = Schema::new()
        .labeled("password", "Password", &[Rule::Required])
        .labeled("hash", "Hash", &[Rule::Required, Rule::Len(60)]);
}

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub probes: Vec<Probe>,
    pub jwt_secret: JwtSecret,
    pub token_ttl: Duration,
}

impl FromRef<AppState> for JwtSecret {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_secret.clone()
    }
}

/// Service liveness summary
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// Readiness of every backing service
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub checks: Vec<ProbeStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// Principal the token is issued for
    pub subject: String,
    pub email: String,
}

impl Validate for TokenRequest {
    fn schema() -> &'static Schema {
        &TOKEN_REQUEST
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    /// Lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HashRequest {
    pub password: String,
}

impl Validate for HashRequest {
    fn schema() -> &'static Schema {
        &HASH_REQUEST
    }
}

#[derive(Debug, Serialize)]
pub struct HashResponse {
    pub hash: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub password: String,
    /// bcrypt hash produced by `/api/passwords/hash`
    pub hash: String,
}

impl Validate for VerifyRequest {
    fn schema() -> &'static Schema {
        &VERIFY_REQUEST
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = crate::response::Envelope)
    )
)]
pub async fn health(respond: Responder) -> Response {
    respond.data(&HealthStatus {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: START_TIME.elapsed().as_secs(),
    })
}

/// Liveness probe - the process is up and serving
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive", body = crate::response::Envelope)
    )
)]
pub async fn health_live(respond: Responder) -> Response {
    respond.success()
}

/// Readiness probe - every configured backing service answers
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "All dependencies reachable", body = crate::response::Envelope),
        (status = 500, description = "At least one dependency is down", body = crate::response::Envelope)
    )
)]
pub async fn health_ready(State(state): State<AppState>, respond: Responder) -> Response {
    let checks = check_all(&state.probes).await;

    let failing: Vec<String> = checks
        .iter()
        .filter(|check| !check.healthy)
        .map(|check| format!("{}: {}", check.name, check.error.as_deref().unwrap_or("unreachable")))
        .collect();

    if failing.is_empty() {
        respond.data(&ReadinessReport { ready: true, checks })
    } else {
        respond.exception(Exception::internal("service not ready").with_cause(failing.join("; ")))
    }
}

/// Issue a signed access token
#[utoipa::path(
    post,
    path = "/api/auth/token",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = crate::response::Envelope),
        (status = 400, description = "Invalid request parameters", body = crate::response::Envelope)
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    respond: Responder,
    ValidatedJson(request): ValidatedJson<TokenRequest>,
) -> Result<Response, Exception> {
    let mut claims = Claims::new();
    claims.insert("sub".to_string(), json!(request.subject));
    claims.insert("email".to_string(), json!(request.email));

    let token = generate_token(claims, &state.jwt_secret.0, state.token_ttl)?;
    info!(subject = %request.subject, "Issued access token");

    Ok(respond.data(&TokenResponse {
        token,
        token_type: "Bearer",
        expires_in: state.token_ttl.as_secs(),
    }))
}

/// Claims of the caller's bearer token
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Verified claims", body = crate::response::Envelope),
        (status = 401, description = "Missing, invalid or expired token", body = crate::response::Envelope)
    )
)]
pub async fn me(respond: Responder, JwtClaims(claims): JwtClaims) -> Response {
    respond.data(&claims)
}

/// Hash a password with bcrypt
#[utoipa::path(
    post,
    path = "/api/passwords/hash",
    tag = "passwords",
    request_body = HashRequest,
    responses(
        (status = 200, description = "Password hashed", body = crate::response::Envelope),
        (status = 400, description = "Invalid request parameters", body = crate::response::Envelope)
    )
)]
pub async fn hash(
    respond: Responder,
    ValidatedJson(request): ValidatedJson<HashRequest>,
) -> Result<Response, Exception> {
    let hash = blocking(move || hash_password(&request.password).map_err(Exception::from)).await?;
    Ok(respond.data(&HashResponse { hash }))
}

/// Check a password against a bcrypt hash
#[utoipa::path(
    post,
    path = "/api/passwords/verify",
    tag = "passwords",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Password matches", body = crate::response::Envelope),
        (status = 400, description = "Invalid request parameters", body = crate::response::Envelope),
        (status = 401, description = "Password does not match", body = crate::response::Envelope)
    )
)]
pub async fn verify(
    respond: Responder,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> Result<Response, Exception> {
    blocking(move || compare_password(&request.hash, &request.password)).await?;
    Ok(respond.success())
}

/// Answer for unknown routes
pub async fn not_found() -> Exception {
    Exception::not_found("resource not found")
}

/// bcrypt is CPU bound; keep it off the async workers
async fn blocking<T, F>(work: F) -> Result<T, Exception>
where
    F: FnOnce() -> Result<T, Exception> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Exception::internal("Internal Server Error").with_cause(e))?
}
