//! Bounded retry with per-attempt and overall timeouts.
//!
//! One loading path deliberately trades correctness-on-failure for UI
//! availability: each attempt is raced against a fixed timer, failures
//! back off exponentially up to a small attempt cap, and the whole
//! operation is raced against an outer timeout. Exceeding either bound
//! resolves to the caller's default instead of an error.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::errors::StoreError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub base_backoff: Duration,
    pub overall_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: Duration::from_secs(8),
            base_backoff: Duration::from_millis(250),
            overall_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt)
    }
}

/// Run `f` under `policy`, resolving to `default` when every attempt
/// fails or the overall bound is exceeded. The substitution is logged at
/// `warn` so the degradation is visible without surfacing an error.
pub async fn fetch_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    op_label: &str,
    f: F,
    default: T,
) -> T
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempt_loop = async {
        for attempt in 0..policy.attempts {
            match timeout(policy.attempt_timeout, f()).await {
                Ok(Ok(value)) => return Some(value),
                Ok(Err(err)) => {
                    tracing::warn!(op = %op_label, attempt, error = %err, "Attempt failed");
                }
                Err(_) => {
                    tracing::warn!(
                        op = %op_label,
                        attempt,
                        timeout_ms = policy.attempt_timeout.as_millis() as u64,
                        "Attempt timed out"
                    );
                }
            }
            if attempt + 1 < policy.attempts {
                tokio::time::sleep(policy.backoff_for(attempt)).await;
            }
        }
        None
    };

    match timeout(policy.overall_timeout, attempt_loop).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            tracing::warn!(op = %op_label, "All attempts exhausted, substituting default");
            default
        }
        Err(_) => {
            tracing::warn!(
                op = %op_label,
                timeout_ms = policy.overall_timeout.as_millis() as u64,
                "Overall timeout exceeded, substituting default"
            );
            default
        }
    }
}
