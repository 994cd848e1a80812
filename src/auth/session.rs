//! Bearer session tokens
//!
//! Tokens are opaque: 32 bytes from the OS RNG encoded as URL-safe Base64
//! without padding. Each token maps to an expiry instant; there is no
//! revocation, a token simply stops being valid once its expiry passes.
//! Expired entries are evicted lazily on lookup and by a periodic sweep.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant};

/// Length of the random part of a token in bytes
const TOKEN_RANDOM_BYTES: usize = 32;

/// Configuration for the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime of an issued token
    pub ttl: Duration,

    /// Interval between expired-token sweeps
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Issues and validates bearer tokens
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    sessions: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SessionManager {
    /// Create a new session manager with the given configuration
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new session manager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(SessionConfig::default())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Issue a new token valid for the configured lifetime
    pub fn create_token(&self) -> String {
        let token = generate_token();
        let expires_at = expiry_from_now(self.config.ttl);

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sessions.insert(token.clone(), expires_at);

        token
    }

    /// Check whether a token was issued and has not expired
    ///
    /// Unknown and expired tokens are indistinguishable to the caller. An
    /// expired token found here is removed from the map.
    pub fn is_valid(&self, token: &str) -> bool {
        self.expires_at(token).is_some()
    }

    /// Expiry of a valid token, `None` for unknown or expired tokens
    pub fn expires_at(&self, token: &str) -> Option<DateTime<Utc>> {
        if token.is_empty() {
            return None;
        }

        let now = Utc::now();
        let expires_at = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            *sessions.get(token)?
        };

        if expires_at > now {
            return Some(expires_at);
        }

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Re-check under the write lock
        if matches!(sessions.get(token), Some(exp) if *exp <= now) {
            sessions.remove(token);
        }
        None
    }

    /// Remove every expired token, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, expires_at| *expires_at > now);
        before - sessions.len()
    }

    /// Number of tokens currently held, including not yet swept expired ones
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Periodically purge expired tokens until shutdown is signaled
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.config.sweep_interval;
        let mut timer = interval_at(Instant::now() + period, period);

        tracing::info!(
            interval_secs = period.as_secs(),
            "Session sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Session sweeper shutting down");
                    break;
                }
                _ = timer.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            remaining = self.active_sessions(),
                            "Purged expired sessions"
                        );
                    }
                }
            }
        }
    }

    #[cfg(test)]
    fn insert_with_expiry(&self, token: &str, expires_at: DateTime<Utc>) {
        self.sessions
            .write()
            .unwrap()
            .insert(token.to_string(), expires_at);
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn expiry_from_now(ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
