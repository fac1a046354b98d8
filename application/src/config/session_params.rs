//! Session parameters: retry, backoff and timeout control.
//!
//! [`SessionParams`] groups the static parameters bounding the
//! [`ReconfigurationSession`](crate::use_cases::run_reconfiguration::ReconfigurationSession)
//! retry loops. These are application-layer concerns, not channel policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and timeout parameters for one reconfiguration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionParams {
    /// Maximum attempts per gateway call before giving up on a transient
    /// failure.
    pub max_gateway_attempts: u32,
    /// Base delay of the exponential backoff between gateway attempts.
    pub backoff_base: Duration,
    /// Bound on each individual network call.
    pub call_timeout: Duration,
    /// Bound on each signer request during collection.
    pub signer_timeout: Duration,
    /// How long to wait for a submitted update to commit.
    pub commit_timeout: Duration,
    /// Total rounds the session may run: 1 initial plus restarts after a
    /// rejected submission or an ambiguous commit.
    pub max_rounds: u32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            max_gateway_attempts: 4,
            backoff_base: Duration::from_millis(500),
            call_timeout: Duration::from_secs(30),
            signer_timeout: Duration::from_secs(30),
            commit_timeout: Duration::from_secs(45),
            max_rounds: 3,
        }
    }
}

impl SessionParams {
    // ==================== Builder Methods ====================

    pub fn with_max_gateway_attempts(mut self, attempts: u32) -> Self {
        self.max_gateway_attempts = attempts;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_signer_timeout(mut self, timeout: Duration) -> Self {
        self.signer_timeout = timeout;
        self
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Exponential backoff delay for the given 1-based attempt number.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}
