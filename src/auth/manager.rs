//! Authentication manager
//!
//! This module composes the login tracker, the session manager and the
//! credential matchers into the two login flows exposed over HTTP.
//!
//! Every flow follows the same order: lockout check, then credential
//! check, then failure recording. A refused attempt while locked out is not
//! counted as a failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::AuthError;
use crate::otel::GatewayMetrics;

use super::credentials::CredentialMatcher;
use super::lockout::{LockoutConfig, LoginTracker};
use super::session::{SessionConfig, SessionManager};

/// Configuration for the authentication manager
#[derive(Clone, Default)]
pub struct AuthManagerConfig {
    /// Expected username
    pub username: String,

    /// Expected password, plain or an Argon2 PHC string
    pub password: String,

    /// Shared secret accepted by the secret login
    pub auto_login_secret: String,

    /// Lockout policy
    pub lockout: LockoutConfig,

    /// Session policy
    pub session: SessionConfig,
}

impl std::fmt::Debug for AuthManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManagerConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auto_login_secret", &"<redacted>")
            .field("lockout", &self.lockout)
            .field("session", &self.session)
            .finish()
    }
}

/// Authentication manager
///
/// Owns the process-wide lockout and session state. Share it behind an
/// `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct AuthManager {
    username: CredentialMatcher,
    password: CredentialMatcher,
    secret: CredentialMatcher,
    tracker: LoginTracker,
    sessions: Arc<SessionManager>,
    lockouts: AtomicU64,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl AuthManager {
    /// Create a new authentication manager
    pub fn new(config: AuthManagerConfig) -> Self {
        Self {
            username: CredentialMatcher::new(&config.username),
            password: CredentialMatcher::new(&config.password),
            secret: CredentialMatcher::new(&config.auto_login_secret),
            tracker: LoginTracker::new(config.lockout),
            sessions: Arc::new(SessionManager::new(config.session)),
            lockouts: AtomicU64::new(0),
            metrics: None,
        }
    }

    /// Report lockouts to the gateway metrics
    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Username/password login
    ///
    /// Returns a fresh bearer token on success.
    pub fn login(&self, user: &str, pass: &str) -> Result<String, AuthError> {
        if self.tracker.is_locked_out() {
            return Err(AuthError::LockedOut);
        }

        // Evaluate both so timing does not reveal which one was wrong
        let user_ok = self.username.matches(user);
        let pass_ok = self.password.matches(pass);

        if user_ok && pass_ok {
            Ok(self.succeed())
        } else {
            self.fail();
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Shared-secret login
    pub fn login_with_secret(&self, secret: &str) -> Result<String, AuthError> {
        if self.tracker.is_locked_out() {
            return Err(AuthError::LockedOut);
        }

        if self.secret.matches(secret) {
            Ok(self.succeed())
        } else {
            self.fail();
            Err(AuthError::InvalidSecret)
        }
    }

    /// Validate a bearer token, returning its expiry
    pub fn validate_token(&self, token: &str) -> Result<DateTime<Utc>, AuthError> {
        self.sessions
            .expires_at(token)
            .ok_or(AuthError::InvalidToken)
    }

    /// Login tracker shared by both flows
    pub fn tracker(&self) -> &LoginTracker {
        &self.tracker
    }

    /// Session store, shared with the expiry sweeper
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Number of times a failure engaged the lockout
    pub fn lockouts_engaged(&self) -> u64 {
        self.lockouts.load(Ordering::Relaxed)
    }

    fn succeed(&self) -> String {
        self.tracker.reset();
        self.sessions.create_token()
    }

    fn fail(&self) {
        if self.tracker.record_failure() {
            self.lockouts.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = &self.metrics {
                metrics.record_lockout();
            }
            tracing::warn!(
                failures = self.tracker.failure_count(),
                lockout_secs = self.tracker.config().lockout_duration.as_secs(),
                "Login lockout engaged"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn test_config() -> AuthManagerConfig {
        AuthManagerConfig {
            username: "admin".to_string(),
            password: "admin_password".to_string(),
            auto_login_secret: "shared_secret".to_string(),
            lockout: LockoutConfig::default(),
            session: SessionConfig::default(),
        }
    }

    fn create_test_manager() -> AuthManager {
        AuthManager::new(test_config())
    }

    // Test 1: login succeeds with correct credentials and issues a valid token
    #[test]
    fn test_login_success() {
        let manager = create_test_manager();

        let token = manager.login("admin", "admin_password").unwrap();

        assert!(manager.sessions().is_valid(&token));
        assert!(manager.validate_token(&token).is_ok());
    }

    // Test 2: Every successful login issues a distinct token
    #[test]
    fn test_login_tokens_unique() {
        let manager = create_test_manager();

        let tokens: HashSet<String> = (0..10)
            .map(|_| manager.login("admin", "admin_password").unwrap())
            .collect();

        assert_eq!(tokens.len(), 10);
    }

    // Test 3: Wrong password, wrong username and both wrong all fail
    #[test]
    fn test_login_invalid_credentials() {
        let manager = create_test_manager();

        assert_eq!(
            manager.login("admin", "wrong"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            manager.login("x", "admin_password"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(manager.login("x", "wrong"), Err(AuthError::InvalidCredentials));
        assert_eq!(manager.tracker().failure_count(), 3);
    }

    // Test 4: Each failure increments the counter by exactly one
    #[test]
    fn test_failure_increments_by_one() {
        let manager = create_test_manager();

        for expected in 1..=4 {
            let _ = manager.login("x", "wrong");
            assert_eq!(manager.tracker().failure_count(), expected);
        }
    }

    // Test 5: Five failures then correct credentials gives LockedOut
    #[test]
    fn test_lockout_checked_before_credentials() {
        let manager = create_test_manager();

        for _ in 0..5 {
            assert_eq!(manager.login("x", "wrong"), Err(AuthError::InvalidCredentials));
        }

        assert_eq!(
            manager.login("admin", "admin_password"),
            Err(AuthError::LockedOut)
        );
        assert_eq!(
            manager.login_with_secret("shared_secret"),
            Err(AuthError::LockedOut)
        );
    }

    // Test 6: Refused attempts during a lockout are not counted
    #[test]
    fn test_locked_attempt_not_counted() {
        let manager = create_test_manager();

        for _ in 0..5 {
            let _ = manager.login("x", "wrong");
        }
        assert_eq!(manager.tracker().failure_count(), 5);

        let _ = manager.login("x", "wrong");
        let _ = manager.login_with_secret("wrong");

        assert_eq!(manager.tracker().failure_count(), 5);
    }

    // Test 7: One failure, one success, four failures does not lock
    #[test]
    fn test_success_resets_counter() {
        let manager = create_test_manager();

        let _ = manager.login("x", "wrong");
        assert!(manager.login("admin", "admin_password").is_ok());
        assert_eq!(manager.tracker().failure_count(), 0);

        for _ in 0..4 {
            assert_eq!(manager.login("x", "wrong"), Err(AuthError::InvalidCredentials));
        }
        assert!(!manager.tracker().is_locked_out());
        assert!(manager.login("admin", "admin_password").is_ok());
    }

    // Test 8: Secret login success and failure
    #[test]
    fn test_login_with_secret() {
        let manager = create_test_manager();

        let token = manager.login_with_secret("shared_secret").unwrap();
        assert!(manager.sessions().is_valid(&token));

        assert_eq!(
            manager.login_with_secret("wrong"),
            Err(AuthError::InvalidSecret)
        );
        assert_eq!(manager.tracker().failure_count(), 1);
    }

    // Test 9: Failures from both endpoints share one counter
    #[test]
    fn test_lockout_shared_across_endpoints() {
        let manager = create_test_manager();

        for _ in 0..3 {
            let _ = manager.login("x", "wrong");
        }
        for _ in 0..2 {
            let _ = manager.login_with_secret("wrong");
        }

        assert!(manager.tracker().is_locked_out());
        assert_eq!(
            manager.login("admin", "admin_password"),
            Err(AuthError::LockedOut)
        );
    }

    // Test 10: Lockout clears after its duration without a reset
    #[test]
    fn test_lockout_expires() {
        let manager = AuthManager::new(AuthManagerConfig {
            lockout: LockoutConfig {
                max_failures: 5,
                lockout_duration: Duration::from_millis(100),
            },
            ..test_config()
        });

        for _ in 0..5 {
            let _ = manager.login("x", "wrong");
        }
        assert_eq!(
            manager.login("admin", "admin_password"),
            Err(AuthError::LockedOut)
        );

        std::thread::sleep(Duration::from_millis(150));

        assert!(manager.login("admin", "admin_password").is_ok());
    }

    // Test 11: validate_token rejects empty and unknown tokens
    #[test]
    fn test_validate_token_invalid() {
        let manager = create_test_manager();

        assert_eq!(manager.validate_token(""), Err(AuthError::InvalidToken));
        assert_eq!(
            manager.validate_token("never-issued"),
            Err(AuthError::InvalidToken)
        );
    }

    // Test 12: Debug output does not leak secrets
    #[test]
    fn test_config_debug_redacts() {
        let debug = format!("{:?}", test_config());

        assert!(debug.contains("admin"));
        assert!(!debug.contains("admin_password"));
        assert!(!debug.contains("shared_secret"));
    }

    // Test 13: Concurrent failures at the threshold count one lockout
    #[test]
    fn test_concurrent_failures_engage_one_lockout() {
        let manager = Arc::new(
            create_test_manager().with_metrics(Arc::new(GatewayMetrics::global())),
        );

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    let _ = manager.login("x", "wrong");
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(manager.tracker().is_locked_out());
        assert_eq!(manager.lockouts_engaged(), 1);

        // Refused while locked, so no second lockout
        let _ = manager.login("x", "wrong");
        assert_eq!(manager.lockouts_engaged(), 1);
    }
}
