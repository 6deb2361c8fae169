use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::process::LaunchError;

/// Decision returned by the busy-retry policy after a failed launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep `delay`, then try the launch again (1-based attempt number).
    Retry { attempt: u32, delay: Duration },
    /// Consecutive busy failures exhausted the cap. Escalate as fatal.
    GiveUp,
}

/// Retry policy for relaunches that fail because the executable file is
/// still busy right after being overwritten.
///
/// Tracks consecutive busy failures and hands out exponentially growing
/// backoff delays (base, 2x base, 4x base, ...). The busy condition
/// clears within milliseconds on most systems, so a few bounded retries
/// absorb it while a genuinely broken launch still surfaces as an error.
pub struct BusyRetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    current_attempt: u32,
}

impl BusyRetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            current_attempt: 0,
        }
    }

    /// Register one busy failure and decide what happens next.
    pub fn evaluate(&mut self) -> RetryDecision {
        self.current_attempt += 1;

        if self.current_attempt <= self.max_attempts {
            let delay = self
                .base_delay
                .saturating_mul(2u32.saturating_pow(self.current_attempt - 1));
            warn!(
                attempt = self.current_attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "executable busy, backing off before retrying"
            );
            RetryDecision::Retry {
                attempt: self.current_attempt,
                delay,
            }
        } else {
            warn!(
                max_attempts = self.max_attempts,
                "busy retries exhausted, giving up"
            );
            RetryDecision::GiveUp
        }
    }

    /// Clear the failure streak after a successful launch.
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// Consecutive busy failures so far (0 = none).
    #[allow(dead_code)]
    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

/// Drive one launch through the busy-retry policy.
///
/// A busy failure sleeps out its backoff and calls `attempt` again
/// without re-checking the watched file. The first success resets the
/// policy. Any other error, or running past the cap, hands the launch
/// error back to the caller.
pub async fn relaunch_with_backoff<T, F, Fut>(
    policy: &mut BusyRetryPolicy,
    mut attempt: F,
) -> Result<T, LaunchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LaunchError>>,
{
    loop {
        match attempt().await {
            Ok(value) => {
                policy.reset();
                return Ok(value);
            }
            Err(LaunchError::Busy { source }) => match policy.evaluate() {
                RetryDecision::Retry { attempt, delay } => {
                    sleep(delay).await;
                    debug!(attempt, "backoff elapsed, retrying launch");
                }
                RetryDecision::GiveUp => return Err(LaunchError::Busy { source }),
            },
            Err(other) => return Err(other),
        }
    }
}
