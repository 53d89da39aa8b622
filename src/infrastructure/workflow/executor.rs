//! Activity execution with retry, backoff and per-attempt timeouts

use std::future::Future;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use super::shutdown::ShutdownSignal;
use crate::domain::workflow::{ActivityError, RetryPolicy};
use crate::infrastructure::observability::record_activity_attempt;

/// Terminal outcome of one activity run
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityOutcome<T> {
    Completed { value: T, attempts: u32 },
    /// Retries exhausted, or a non-retryable error; carries the last error
    Failed { error: ActivityError, attempts: u32 },
    /// Shutdown interrupted an attempt or a backoff wait
    Cancelled,
}

impl<T> ActivityOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
            Self::Cancelled => 0,
        }
    }
}

/// Bookkeeping for the attempt in flight; never persisted
#[derive(Debug, Default)]
struct ActivityAttempt {
    attempt: u32,
    next_retry_at: Option<Instant>,
    last_error: Option<ActivityError>,
}

/// Runs a single fallible operation until it succeeds, fails permanently or
/// runs out of attempts
///
/// Activity errors never escape as `Err`; they are folded into the returned
/// [`ActivityOutcome`] and the caller decides what a failure means.
#[derive(Debug, Clone)]
pub struct ActivityExecutor {
    shutdown: ShutdownSignal,
}

impl ActivityExecutor {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self { shutdown }
    }

    /// Run `operation`, passing the 1-indexed attempt number to each call
    pub async fn run<T, F, Fut>(
        &self,
        activity: &str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> ActivityOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        let mut shutdown = self.shutdown.clone();
        let max_attempts = policy.max_attempts.max(1);
        let mut current = ActivityAttempt::default();

        loop {
            if shutdown.is_triggered() {
                return ActivityOutcome::Cancelled;
            }

            current.attempt += 1;
            let attempt = current.attempt;

            debug!(activity = activity, attempt = attempt, "Starting activity attempt");

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return ActivityOutcome::Cancelled,
                result = timeout(policy.attempt_timeout(), operation(attempt)) => result,
            };

            let error = match result {
                Ok(Ok(value)) => {
                    record_activity_attempt(activity, "success");
                    debug!(activity = activity, attempt = attempt, "Activity attempt succeeded");
                    return ActivityOutcome::Completed {
                        value,
                        attempts: attempt,
                    };
                }
                Ok(Err(error)) => {
                    record_activity_attempt(
                        activity,
                        if error.is_retryable() {
                            "transient"
                        } else {
                            "non_retryable"
                        },
                    );
                    error
                }
                Err(_) => {
                    record_activity_attempt(activity, "timeout");
                    ActivityError::transient(format!(
                        "attempt timed out after {}ms",
                        policy.attempt_timeout_ms
                    ))
                }
            };

            if !error.is_retryable() || attempt >= max_attempts {
                warn!(
                    activity = activity,
                    attempts = attempt,
                    error = %error,
                    "Activity failed"
                );
                return ActivityOutcome::Failed {
                    error,
                    attempts: attempt,
                };
            }

            let delay = policy.delay_after_attempt(attempt);
            current.next_retry_at = Some(Instant::now() + delay);
            warn!(
                activity = activity,
                attempt = attempt,
                max_attempts = max_attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Activity attempt failed, retrying"
            );
            current.last_error = Some(error);

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(
                        activity = activity,
                        next_retry_at = ?current.next_retry_at,
                        last_error = ?current.last_error,
                        "Backoff interrupted by shutdown"
                    );
                    return ActivityOutcome::Cancelled;
                }
                _ = sleep(delay) => {}
            }
        }
    }
}
