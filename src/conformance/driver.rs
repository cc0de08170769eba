use super::attempt::{AttemptResult, AttemptRunner};
use super::error::{AttemptError, FinalError};
use super::expectation::Expectation;
use super::workload::WorkloadSpec;
use tracing::{info, warn};

/// Attempts made before declaring a verification failed. The image registry is not stable and
/// sometimes fails to serve pulls, so a single failed attempt is not conclusive.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Repeats whole attempts, each one with a freshly created workload, until one succeeds or the
/// attempt budget is exhausted.
pub struct FlakyRetryDriver<A: AttemptRunner> {
    runner: A,
    max_attempts: usize,
}

impl<A: AttemptRunner> FlakyRetryDriver<A> {
    pub fn new(runner: A) -> Self {
        Self {
            runner,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Only the diagnostic of the last attempt is surfaced. Earlier ones are logged.
    pub async fn run(
        &self,
        template: &WorkloadSpec,
        expectation: &Expectation,
    ) -> Result<(), FinalError> {
        if self.max_attempts == 0 {
            return Err(FinalError::NoAttempts);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.runner.run_attempt(template, expectation).await {
                Ok(AttemptResult::Success) => {
                    info!(workload = %template.name, attempt, "verification succeeded");
                    return Ok(());
                }
                Ok(AttemptResult::Failure(diagnostic)) if attempt >= self.max_attempts => {
                    return Err(FinalError::AttemptsExhausted {
                        attempts: attempt,
                        diagnostic,
                    });
                }
                Ok(AttemptResult::Failure(diagnostic)) => {
                    warn!("No.{attempt} attempt failed: {diagnostic}, retrying...");
                }
                Err(AttemptError::Setup(source)) => {
                    return Err(FinalError::Setup {
                        attempts: attempt,
                        source,
                    });
                }
                Err(AttemptError::Cancelled(_)) => {
                    return Err(FinalError::Cancelled { attempts: attempt });
                }
            }
        }
    }
}
