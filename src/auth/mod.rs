//! Authentication system for auth-gateway
//!
//! This module provides:
//! - A global failure lockout shared by all login flows
//! - Bearer session issuance and validation
//! - Constant-time credential matching

pub mod credentials;
pub mod lockout;
pub mod manager;
pub mod session;

pub use credentials::CredentialMatcher;
pub use lockout::{LockoutConfig, LoginTracker};
pub use manager::{AuthManager, AuthManagerConfig};
pub use session::{SessionConfig, SessionManager};
