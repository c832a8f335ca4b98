use std::thread;
use std::time::Duration;

use pawtrait_contracts::entities::{GenerationJob, JobStatus};

use crate::error::PipelineError;

/// Poll schedule for a submitted generation job. `max_polls` is an exact
/// fetch budget, not a wall-clock deadline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub max_polls: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_polls: 60,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_factor: 1.5,
        }
    }
}

/// Fetches the job until it reaches a terminal status or the poll budget
/// runs out.
///
/// A retryable fetch error does not abort the wait; it consumes a tick
/// from the same budget like any other not-yet-complete answer. Terminal
/// provider failure maps to `GenerationFailed`, an exhausted budget to
/// `Timeout`. The sleep between ticks starts at `initial_delay` and grows
/// by `backoff_factor` up to `max_delay`. The closure receives the
/// one-based attempt number.
pub fn wait_for_completion(
    policy: &PollPolicy,
    mut fetch: impl FnMut(u32) -> Result<GenerationJob, PipelineError>,
) -> Result<GenerationJob, PipelineError> {
    let budget = policy.max_polls.max(1);
    let mut delay = policy.initial_delay.min(policy.max_delay);

    for attempt in 1..=budget {
        match fetch(attempt) {
            Ok(job) => match job.status {
                JobStatus::Complete => return Ok(job),
                JobStatus::Failed => {
                    return Err(PipelineError::GenerationFailed(format!(
                        "provider reported generation {} as failed",
                        job.id
                    )))
                }
                JobStatus::Pending => {}
            },
            Err(err) if err.is_retryable() => {}
            Err(err) => return Err(err),
        }

        if attempt < budget {
            thread::sleep(delay);
            delay = grow_delay(delay, policy.backoff_factor, policy.max_delay);
        }
    }

    Err(PipelineError::Timeout { polls: budget })
}

fn grow_delay(current: Duration, factor: f64, cap: Duration) -> Duration {
    current.mul_f64(factor.max(1.0)).min(cap)
}
