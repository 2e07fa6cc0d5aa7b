use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::StageId;

/// Bounds on re-running a stage
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts allowed for malformed or invalid responses
    pub max_attempts: u32,
    /// Gateway failures tolerated per stage, on top of the structural attempts
    pub max_gateway_retries: u32,
    /// First gateway backoff; doubles after each failure
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_gateway_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// What the stage body is told about the attempt it is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based structural attempt number
    pub number: u32,
    /// Corrective hint derived from the previous structural failure
    pub hint: Option<String>,
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Backoff before the `failures`-th gateway retry (1-based)
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `body` until it succeeds or a bound is hit.
    ///
    /// - Malformed/validation errors consume an attempt; the next attempt gets
    ///   a hint built by `hint_for`.
    /// - Gateway errors are retried with backoff without consuming an attempt,
    ///   up to `max_gateway_retries`.
    /// - Anything else is returned at once as `Fatal`.
    pub async fn attempt<T, F, Fut, H>(
        &self,
        stage: &StageId,
        hint_for: H,
        mut body: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
        H: Fn(&PipelineError) -> String,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut number = 1;
        let mut gateway_failures = 0;
        let mut hint: Option<String> = None;

        loop {
            let attempt = Attempt {
                number,
                hint: hint.clone(),
            };

            let error = match body(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if error.is_gateway() {
                gateway_failures += 1;
                if gateway_failures > self.max_gateway_retries {
                    warn!("Stage {}: gateway retries exhausted: {}", stage, error);
                    return Err(exhausted(stage, number, error));
                }
                let delay = self.backoff(gateway_failures);
                warn!(
                    "Stage {}: gateway error ({}), retrying in {:?} ({}/{})",
                    stage, error, delay, gateway_failures, self.max_gateway_retries
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if error.is_structural() {
                if number >= max_attempts {
                    warn!(
                        "Stage {}: attempt {}/{} failed, giving up: {}",
                        stage, number, max_attempts, error
                    );
                    return Err(exhausted(stage, number, error));
                }
                warn!(
                    "Stage {}: attempt {}/{} failed: {}",
                    stage, number, max_attempts, error
                );
                hint = Some(hint_for(&error));
                number += 1;
                info!("Stage {}: retry {} of {}", stage, number - 1, max_attempts - 1);
                continue;
            }

            return Err(PipelineError::Fatal {
                stage: stage.clone(),
                attempts: number,
                source: Box::new(error),
            });
        }
    }
}

fn exhausted(stage: &StageId, attempts: u32, last_error: PipelineError) -> PipelineError {
    PipelineError::StageExhausted {
        stage: stage.clone(),
        attempts,
        last_error: Box::new(last_error),
    }
}
