use super::attempt::AttemptResult;
use super::classifier::classify;
use super::error::WorkloadError;
use super::expectation::Expectation;
use super::status::ObservedStatus;
use crate::context::{Cancelled, Context};
use duration_str::deserialize_duration;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// How often and for how long the status of a workload is polled within an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollConfig {
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub interval: Duration,
    #[serde(
        default = "default_deadline",
        deserialize_with = "deserialize_duration"
    )]
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_POLL_DEADLINE,
        }
    }
}

fn default_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_deadline() -> Duration {
    DEFAULT_POLL_DEADLINE
}

/// Polls `fetch` until the observed status satisfies `expectation` or `config.deadline` elapses.
///
/// Fetch errors are transient: they become the current diagnostic and polling goes on. The
/// returned failure carries the diagnostic of the last poll.
pub async fn poll_until_match<F, Fut>(
    ctx: &Context,
    expectation: &Expectation,
    config: &PollConfig,
    mut fetch: F,
) -> Result<AttemptResult, Cancelled>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ObservedStatus, WorkloadError>>,
{
    let start = Instant::now();
    let mut polls: usize = 0;

    loop {
        polls += 1;
        let diagnostic = match ctx.run(fetch()).await? {
            Ok(observed) => match classify(&observed, expectation) {
                Ok(()) => {
                    debug!(polls, "container status matches the expectation");
                    return Ok(AttemptResult::Success);
                }
                Err(mismatch) => mismatch.to_string(),
            },
            Err(err) => format!("failed to get container status: {err}"),
        };

        if start.elapsed() >= config.deadline {
            debug!(polls, "container status check deadline reached: {diagnostic}");
            return Ok(AttemptResult::Failure(diagnostic));
        }
        trace!(polls, "container status does not match yet: {diagnostic}");
        ctx.sleep(config.interval).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::expectation::{PodPhase, ERR_IMAGE_PULL_BACK_OFF};
    use crate::conformance::status::RunState;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(interval_secs: u64, deadline_secs: u64) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(interval_secs),
            deadline: Duration::from_secs(deadline_secs),
        }
    }

    fn status_not_found() -> WorkloadError {
        WorkloadError::ContainerStatusNotFound {
            pod: "image-pull-test".to_string(),
            container: "image-pull-test".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_poll_after_image_pull_back_off() {
        let mut sequence = vec![
            ObservedStatus::new(RunState::waiting(ERR_IMAGE_PULL_BACK_OFF), PodPhase::Pending),
            ObservedStatus::new(RunState::waiting(ERR_IMAGE_PULL_BACK_OFF), PodPhase::Pending),
            ObservedStatus::new(RunState::Running, PodPhase::Running),
        ]
        .into_iter();
        let mut polls = 0;

        let start = Instant::now();
        let result = poll_until_match(
            &Context::new(),
            &Expectation::running(PodPhase::Running),
            &config(1, 300),
            || {
                polls += 1;
                let next = sequence.next();
                async move { Ok(next.expect("polled after success")) }
            },
        )
        .await;

        assert_eq!(result, Ok(AttemptResult::Success));
        assert_eq!(polls, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_without_waiting_for_deadline() {
        let mut polls = 0;
        let start = Instant::now();

        let result = poll_until_match(
            &Context::new(),
            &Expectation::running(PodPhase::Running),
            &config(1, 300),
            || {
                polls += 1;
                async { Ok(ObservedStatus::new(RunState::Running, PodPhase::Running)) }
            },
        )
        .await;

        assert_eq!(result, Ok(AttemptResult::Success));
        assert_eq!(polls, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_at_deadline_with_last_diagnostic() {
        let mut polls = 0;
        let start = Instant::now();

        let result = poll_until_match(
            &Context::new(),
            &Expectation::running(PodPhase::Running),
            &config(1, 3),
            || {
                polls += 1;
                async {
                    Ok(ObservedStatus::new(
                        RunState::waiting(ERR_IMAGE_PULL_BACK_OFF),
                        PodPhase::Pending,
                    ))
                }
            },
        )
        .await;

        assert_eq!(
            result,
            Ok(AttemptResult::Failure(
                "expected container state: Running, got: \"Waiting\"".to_string()
            ))
        );
        // Polls at 0s, 1s, 2s and 3s, slept in 1s increments.
        assert_eq!(polls, 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_are_retried_until_deadline() {
        let mut polls = 0;

        let result = poll_until_match(
            &Context::new(),
            &Expectation::running(PodPhase::Running),
            &config(2, 5),
            || {
                polls += 1;
                async { Err(status_not_found()) }
            },
        )
        .await;

        assert_matches!(
            result,
            Ok(AttemptResult::Failure(diagnostic)) if diagnostic.starts_with("failed to get container status: ")
        );
        // Polls at 0s, 2s, 4s and 6s.
        assert_eq!(polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_then_match_succeeds() {
        let mut polls = 0;

        let result = poll_until_match(
            &Context::new(),
            &Expectation::waiting(PodPhase::Pending),
            &config(1, 10),
            || {
                polls += 1;
                let first = polls == 1;
                async move {
                    if first {
                        Err(status_not_found())
                    } else {
                        Ok(ObservedStatus::new(
                            RunState::waiting(ERR_IMAGE_PULL_BACK_OFF),
                            PodPhase::Pending,
                        ))
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(AttemptResult::Success));
        assert_eq!(polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_polling() {
        let ctx = Context::new();
        let polls = Arc::new(AtomicUsize::new(0));
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel_all();
        });

        let result = poll_until_match(
            &ctx,
            &Expectation::running(PodPhase::Running),
            &config(1, 300),
            || {
                polls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ObservedStatus::new(RunState::Unknown, PodPhase::Pending)) }
            },
        )
        .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_poll_config_from_yaml() {
        let config: PollConfig = serde_yaml::from_str("interval: 2s\ndeadline: 1m").unwrap();
        assert_eq!(config, self::config(2, 60));

        let config: PollConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, PollConfig::default());
    }
}
