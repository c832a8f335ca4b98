use std::thread;
use std::time::Duration;

use crate::error::PipelineError;
use crate::push_unique_warning;

/// Bounded retry schedule for one outbound HTTP call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay slept before retry number `retry` (zero-based), capped.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(retry.min(32) as i32);
        self.base_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping between attempts.
///
/// Only retryable failures (transient transport errors, HTTP 429/5xx) are
/// retried; a 401/403 or any other terminal error returns immediately.
/// Each retry appends a warning. The closure receives the zero-based
/// attempt number.
pub fn send_with_retries<T>(
    policy: &RetryPolicy,
    label: &str,
    warnings: &mut Vec<String>,
    mut op: impl FnMut(u32) -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt + 1 >= attempts {
                    return Err(err);
                }
                push_unique_warning(
                    warnings,
                    format!(
                        "{label} retry {}/{} after transient failure: {err}",
                        attempt + 1,
                        attempts - 1
                    ),
                );
                thread::sleep(policy.delay_before_retry(attempt));
            }
        }
    }

    unreachable!("retry loop returns before exhausting attempts")
}
