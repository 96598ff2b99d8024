//! Per-node retry policies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a node's failures are retried.
///
/// The back-off before attempt `n` (1-indexed; attempt 0 is the first
/// try) is `min(initial_delay × multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (so `3` means up to 2 retries).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay on each further retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Error codes eligible for retry. When absent, eligibility falls
    /// back to the error's category (transient and rate-limit retry).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable_errors: Option<Vec<String>>,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            retryable_errors: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// A policy restricted to an explicit list of error codes.
    #[must_use]
    pub fn for_codes<S: Into<String>>(codes: impl IntoIterator<Item = S>) -> Self {
        Self {
            retryable_errors: Some(codes.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// The back-off before retry attempt `attempt` (1-indexed).
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1);
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent as i32);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether an error with `code` is eligible for retry.
    ///
    /// `category_retryable` carries the error category's default
    /// eligibility (transient/rate-limit yes, permanent/validation no);
    /// an explicit code list overrides it.
    #[must_use]
    pub fn allows(&self, code: &str, category_retryable: bool) -> bool {
        match &self.retryable_errors {
            Some(codes) => codes.iter().any(|c| c == code),
            None => category_retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_follows_exponential_curve() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay_ms: 10,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            retryable_errors: None,
        };
        assert_eq!(policy.delay_before(1), Duration::from_millis(10));
        assert_eq!(policy.delay_before(2), Duration::from_millis(20));
        assert_eq!(policy.delay_before(3), Duration::from_millis(40));
        assert_eq!(policy.delay_before(4), Duration::from_millis(80));
    }

    #[test]
    fn backoff_is_capped_at_max_delay() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay_ms: 1_000,
            backoff_multiplier: 10.0,
            max_delay_ms: 5_000,
            retryable_errors: None,
        };
        assert_eq!(policy.delay_before(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_before(2), Duration::from_millis(5_000));
        assert_eq!(policy.delay_before(9), Duration::from_millis(5_000));
    }

    #[test]
    fn explicit_code_list_overrides_category() {
        let policy = RetryPolicy::for_codes(["network_error"]);
        assert!(policy.allows("network_error", false));
        assert!(!policy.allows("rate_limit", true));
    }

    #[test]
    fn absent_code_list_falls_back_to_category() {
        let policy = RetryPolicy::default();
        assert!(policy.allows("anything", true));
        assert!(!policy.allows("anything", false));
    }

    #[test]
    fn none_policy_has_single_attempt() {
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }

    #[test]
    fn serde_defaults_fill_missing_fields() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay_ms, 1_000);
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert!(policy.retryable_errors.is_none());
    }
}
