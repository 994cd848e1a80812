//! HTTP middleware and extractors for auth-gateway
//!
//! This module provides:
//! - RFC 7807 problem responses for authentication failures
//! - Bearer token and connection identifier extractors
//! - Request/response logging and tracing spans

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Content type of problem responses
pub const PROBLEM_JSON: &str = "application/problem+json";

/// Problem details body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub status: u16,
    pub title: String,
    pub detail: String,
}

/// Authentication error response
#[derive(Debug, Clone)]
pub struct AuthResponse {
    status: StatusCode,
    detail: String,
}

impl AuthResponse {
    pub fn from_error(error: AuthError) -> Self {
        match error {
            AuthError::LockedOut => Self {
                status: StatusCode::LOCKED,
                detail: "Locked out.".to_string(),
            },
            AuthError::InvalidCredentials => Self {
                status: StatusCode::UNAUTHORIZED,
                detail: "Invalid username or password.".to_string(),
            },
            AuthError::InvalidSecret => Self {
                status: StatusCode::UNAUTHORIZED,
                detail: "Invalid secret.".to_string(),
            },
            AuthError::InvalidToken => Self {
                status: StatusCode::UNAUTHORIZED,
                detail: "Invalid or expired token.".to_string(),
            },
            AuthError::MissingToken => Self {
                status: StatusCode::UNAUTHORIZED,
                detail: "Missing authorization header.".to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AuthError> for AuthResponse {
    fn from(error: AuthError) -> Self {
        Self::from_error(error)
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            status: self.status.as_u16(),
            title: self
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            detail: self.detail,
        };
        // Serializing a struct of plain strings cannot fail
        let body = serde_json::to_string(&body).unwrap_or_default();

        (self.status, [(header::CONTENT_TYPE, PROBLEM_JSON)], body).into_response()
    }
}

/// Token from an `Authorization: Bearer <token>` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AuthResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") => {
                let token = token.trim();
                if token.is_empty() {
                    Err(AuthError::InvalidToken.into())
                } else {
                    Ok(BearerToken(token.to_string()))
                }
            }
            _ => Err(AuthError::MissingToken.into()),
        }
    }
}

/// Peer address of the request, when the server records it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionId(pub Option<String>);

impl ConnectionId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ConnectionId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ConnectionId(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string()),
        ))
    }
}

/// Logging middleware function
///
/// Logs method, path, status code and response time.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}

/// Tracing middleware function
///
/// Wraps the whole request in an `http_request` span so OpenTelemetry
/// export covers async work done by the handler.
pub async fn tracing_middleware(request: Request, next: Next) -> Response {
    use tracing::Instrument;

    let span = tracing::info_span!(
        "http_request",
        http.method = %request.method(),
        http.route = %request.uri().path(),
        http.status_code = tracing::field::Empty,
    );

    async move {
        let response = next.run(request).await;
        tracing::Span::current().record("http.status_code", response.status().as_u16());
        response
    }
    .instrument(span)
    .await
}
