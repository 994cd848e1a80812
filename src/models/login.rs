//! Request and response bodies of the login endpoints
//!
//! Field names follow the wire format (`User`, `Pass`, `Secret`), which is
//! why the structs rename their fields instead of using snake_case JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /login`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "User")]
    pub user: String,

    #[serde(rename = "Pass")]
    pub pass: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth-secret`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretLoginRequest {
    #[serde(rename = "Secret")]
    pub secret: String,
}

impl std::fmt::Debug for SecretLoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretLoginRequest")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Successful login response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Response of `GET /session` for a valid token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub valid: bool,
    pub expires_at: DateTime<Utc>,
}
