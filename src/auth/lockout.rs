//! Failure lockout for authentication attempts
//!
//! A single process-wide tracker counts consecutive failed logins across
//! every login endpoint and identity. Once the count reaches the configured
//! threshold, all attempts are refused until the lockout expires.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Configuration for the login tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lockout
    pub max_failures: u32,

    /// How long a lockout lasts
    pub lockout_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            lockout_duration: Duration::from_secs(900), // 15 minutes
        }
    }
}

#[derive(Debug, Default)]
struct LockoutState {
    failures: u32,
    locked_at: Option<Instant>,
}

impl LockoutState {
    fn is_locked(&self, duration: Duration) -> bool {
        matches!(self.locked_at, Some(at) if at.elapsed() < duration)
    }
}

/// Global failure counter with a lockout timer
///
/// Increment, threshold check and lockout assignment happen under one lock,
/// so concurrent failures can neither skip nor double-trigger the lockout.
#[derive(Debug)]
pub struct LoginTracker {
    config: LockoutConfig,
    state: Mutex<LockoutState>,
}

impl LoginTracker {
    /// Create a new tracker with the given configuration
    pub fn new(config: LockoutConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LockoutState::default()),
        }
    }

    /// Create a new tracker with default configuration
    pub fn with_defaults() -> Self {
        Self::new(LockoutConfig::default())
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// True iff a lockout is set and has not yet expired
    pub fn is_locked_out(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.is_locked(self.config.lockout_duration)
    }

    /// Record a failed attempt
    ///
    /// Returns `true` only for the failure that engages the lockout. A
    /// failure that races in while a lockout is already active is counted
    /// but neither extends nor re-reports it. The counter is only cleared by
    /// [`reset`](Self::reset), so a failure after an expired lockout
    /// re-engages it immediately.
    pub fn record_failure(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.failures = state.failures.saturating_add(1);

        if state.failures < self.config.max_failures
            || state.is_locked(self.config.lockout_duration)
        {
            return false;
        }

        state.locked_at = Some(Instant::now());
        true
    }

    /// Clear the counter and any pending lockout
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = LockoutState::default();
    }

    /// Number of consecutive failures since the last reset
    pub fn failure_count(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
    }

    /// Time left until the lockout expires, `None` when not locked
    pub fn remaining_lockout(&self) -> Option<Duration> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .locked_at
            .and_then(|at| self.config.lockout_duration.checked_sub(at.elapsed()))
            .filter(|remaining| !remaining.is_zero())
    }
}

impl Default for LoginTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}
