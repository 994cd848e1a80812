//! HTTP router for auth-gateway
//!
//! Routes:
//! - `POST /login` and `POST /auth-secret`: issue bearer tokens
//! - `GET /session`: validate a bearer token
//! - `GET /health`: liveness probe

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::audit::AuditLogger;
use crate::auth::AuthManager;
use crate::database::AuditStore;
use crate::error::AuthError;
use crate::models::{LoginRequest, SecretLoginRequest, SessionResponse, TokenResponse};
use crate::otel::{GatewayMetrics, LoginOutcome, ENDPOINT_AUTH_SECRET, ENDPOINT_LOGIN};

use super::middleware::{
    logging_middleware, tracing_middleware, AuthResponse, BearerToken, ConnectionId,
};

/// Shared application state
pub struct AppState<D: AuditStore> {
    /// Authentication manager
    pub auth_manager: Arc<AuthManager>,

    /// Audit logger
    pub audit: Arc<AuditLogger<D>>,

    /// Metric instruments
    pub metrics: Arc<GatewayMetrics>,
}

impl<D: AuditStore> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            auth_manager: Arc::clone(&self.auth_manager),
            audit: Arc::clone(&self.audit),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the main application router
pub fn build_router<D: AuditStore + 'static>(state: AppState<D>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/login", post(login_handler::<D>))
        .route("/auth-secret", post(auth_secret_handler::<D>))
        .route("/session", get(session_handler::<D>))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(tracing_middleware))
        .with_state(state)
}

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Username/password login
///
/// Lockout check, credential check and failure recording happen in that
/// order inside [`AuthManager::login`]; this handler only audits the
/// outcome and maps it to a response.
async fn login_handler<D: AuditStore + 'static>(
    State(state): State<AppState<D>>,
    connection_id: ConnectionId,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthResponse> {
    let start = Instant::now();
    let result = state.auth_manager.login(&request.user, &request.pass);

    let message = match &result {
        Ok(_) => format!("User {} logged in successfully.", request.user),
        Err(AuthError::LockedOut) => {
            format!("Login attempt for user {} rejected: locked out.", request.user)
        }
        Err(_) => format!("Failed login attempt for user {}.", request.user),
    };

    finish_login(&state, ENDPOINT_LOGIN, start, result, &message, connection_id).await
}

/// Shared-secret login
async fn auth_secret_handler<D: AuditStore + 'static>(
    State(state): State<AppState<D>>,
    connection_id: ConnectionId,
    Json(request): Json<SecretLoginRequest>,
) -> Result<Json<TokenResponse>, AuthResponse> {
    let start = Instant::now();
    let result = state.auth_manager.login_with_secret(&request.secret);

    let message = match &result {
        Ok(_) => "Secret login succeeded.",
        Err(AuthError::LockedOut) => "Secret login attempt rejected: locked out.",
        Err(_) => "Failed secret login attempt.",
    };

    finish_login(&state, ENDPOINT_AUTH_SECRET, start, result, message, connection_id).await
}

/// Audit and record metrics for a login outcome, then build the response
async fn finish_login<D: AuditStore>(
    state: &AppState<D>,
    endpoint: &'static str,
    start: Instant,
    result: Result<String, AuthError>,
    message: &str,
    connection_id: ConnectionId,
) -> Result<Json<TokenResponse>, AuthResponse> {
    let connection_id = connection_id.as_deref();

    let outcome = match &result {
        Ok(_) => {
            state.audit.info(message, connection_id).await;
            LoginOutcome::Success
        }
        Err(AuthError::LockedOut) => {
            state.audit.warning(message, connection_id).await;
            LoginOutcome::LockedOut
        }
        Err(_) => {
            state.audit.error(message, connection_id).await;
            LoginOutcome::Failure
        }
    };

    state
        .metrics
        .record_login(endpoint, outcome, start.elapsed().as_secs_f64());

    result
        .map(|token| Json(TokenResponse { token }))
        .map_err(AuthResponse::from_error)
}

/// Bearer token validation
async fn session_handler<D: AuditStore + 'static>(
    State(state): State<AppState<D>>,
    BearerToken(token): BearerToken,
) -> Result<Json<SessionResponse>, AuthResponse> {
    let expires_at = state.auth_manager.validate_token(&token)?;

    Ok(Json(SessionResponse {
        valid: true,
        expires_at,
    }))
}
