//! Domain models for auth-gateway

pub mod log;
pub mod login;

pub use log::{LogLevel, LogRecord, NO_CONNECTION_ID};
pub use login::{LoginRequest, SecretLoginRequest, SessionResponse, TokenResponse};
