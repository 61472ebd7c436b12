//! Bounded retry of optimistic read-modify-write cycles.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Errors that can tell a lost optimistic race apart from a real failure.
pub trait Retryable {
    /// Returns true if the operation lost a version check and may be rerun
    /// against fresh state.
    fn is_conflict(&self) -> bool;
}

/// Retry policy for operations that commit versioned write batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly afterwards.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and the default delay.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Runs `operation` until it succeeds, fails with a non-conflict error, or
/// the attempt budget is spent.
///
/// Each attempt must reload everything it reads; the last conflict is
/// returned when attempts run out.
pub async fn retry_on_conflict<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_conflict() && attempt < max_attempts => {
                debug!(operation = operation_name, attempt, error = %err, "conflict, retrying");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_conflict() {
                    warn!(operation = operation_name, attempts = attempt, "retries exhausted");
                }
                return Err(err);
            }
        }
    }
}
