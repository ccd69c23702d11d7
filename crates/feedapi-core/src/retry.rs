//! Retry policy for transient fetch failures.
//!
//! Pure state machine: it returns delays, the caller sleeps.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff with an attempt budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// First delay in milliseconds (default 250).
    pub initial_backoff_ms: u64,
    /// Growth factor per consecutive failure (default 2.0).
    pub multiplier: f64,
    /// Delay cap in milliseconds (default 30000).
    pub max_backoff_ms: u64,
    /// Consecutive failures tolerated before giving up; 0 means unlimited (default 8).
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 250,
            multiplier: 2.0,
            max_backoff_ms: 30_000,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    Retry(Duration),
    /// Budget exhausted.
    GiveUp { attempts: u32 },
}

/// Consecutive-failure tracker for one partition.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    policy: RetryPolicy,
    failures: u32,
}

impl RetryTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);
        if self.policy.max_attempts > 0 && self.failures > self.policy.max_attempts {
            return RetryDecision::GiveUp {
                attempts: self.failures,
            };
        }

        let exponent = (self.failures - 1).min(i32::MAX as u32) as i32;
        let raw = (self.policy.initial_backoff_ms as f64) * self.policy.multiplier.powi(exponent);
        let capped = if raw.is_finite() {
            (raw as u64).min(self.policy.max_backoff_ms)
        } else {
            self.policy.max_backoff_ms
        };
        RetryDecision::Retry(Duration::from_millis(capped))
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
