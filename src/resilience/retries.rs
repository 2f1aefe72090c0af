//! Retry logic.
//!
//! # Responsibilities
//! - Determine if an upstream call is retryable (idempotent reads only)
//! - Pace retry rounds with exponential backoff + jitter
//!
//! # Design Decisions
//! - Never retry a broadcast: replaying signed bytes, or re-signing with a bumped
//!   sequence, could move funds twice
//! - Jittered backoff prevents thundering herd
//! - Only transport failures are retried; JSON-RPC errors are answers

use std::time::Duration;

use crate::config::schema::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Upstream methods that only read node state.
const IDEMPOTENT_METHODS: &[&str] = &["theta.GetAccount", "theta.GetStatus"];

/// Whether `method` may be sent more than once.
pub fn is_idempotent(method: &str) -> bool {
    IDEMPOTENT_METHODS.contains(&method)
}

/// How often and how patiently to retry an idempotent call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Number of attempts allowed for `method`.
    pub fn attempts_for(&self, method: &str) -> u32 {
        if is_idempotent(method) {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Delay before attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        if !config.enabled {
            return Self::none();
        }
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}
