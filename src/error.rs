//! Authentication and audit store error types for auth-gateway
//!
//! Configuration, server and telemetry errors live next to their modules;
//! the binary joins them with `anyhow`.

use thiserror::Error;

/// Authentication outcomes that are not a success
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Too many recent failures; the attempt was not evaluated
    #[error("Locked out")]
    LockedOut,

    /// Username/password pair did not match
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Shared secret did not match
    #[error("Invalid secret")]
    InvalidSecret,

    /// Bearer token unknown or expired
    #[error("Invalid token")]
    InvalidToken,

    /// No bearer token on the request
    #[error("Missing authorization header")]
    MissingToken,
}

/// Audit store errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Error from the async connection wrapper
    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    /// Target database name cannot be used as a file name
    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),

    /// Existing table does not have the expected layout
    #[error("Schema mismatch: {0}")]
    Schema(String),
}
