//! Per-call deadline plus bounded, jittered retry for collaborator calls

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::collaborators::CollaboratorFault;
use crate::constants::{DEFAULT_COLLABORATOR_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: u32,
    /// Deadline applied to every single attempt
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay to randomize (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            attempt_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based), doubled each time
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64 * 2f64.powi(retry as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let spread = capped * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = if spread > 0.0 {
            rand::rng().random_range(-spread..=spread)
        } else {
            0.0
        };
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    /// Run `operation` under the per-attempt deadline, retrying transient faults.
    ///
    /// A timed-out attempt is dropped, which cancels whatever it had in flight.
    pub async fn run<T, E, F, Fut>(&self, branch: &'static str, mut operation: F) -> Result<T, E>
    where
        E: CollaboratorFault,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            let result = match timeout(self.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(self.attempt_timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    warn!(
                        branch,
                        kind = %err.kind(),
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient collaborator failure, retrying"
                    );
                    sleep(delay).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
