use crate::config::CrawlerConfig;
use crate::fetch::{FetchFailure, FetchFailureKind, FetchPolicy, FetchPort, FetchedPage};
use async_trait::async_trait;
use rand::{rng, Rng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry and pacing schedule applied by [`PoliteFetcher`]
///
/// The delay before attempt `n + 1` is
///
/// ```text
/// min(backoff_base * 2^(n-1), backoff_max) + jitter(0..=backoff_jitter)
/// ```
///
/// plus `blocked_pause` when attempt `n` was blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub backoff_jitter: Duration,
    pub blocked_pause: Duration,
    /// Delay after each finished fetch, successful or not
    pub politeness_delay: Duration,
    pub politeness_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            backoff_jitter: Duration::from_millis(config.backoff_jitter_ms),
            blocked_pause: Duration::from_millis(config.blocked_pause_ms),
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
            politeness_jitter: Duration::from_millis(config.politeness_jitter_ms),
        }
    }

    /// Retries without any waiting; for tests and local mirrors
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            backoff_jitter: Duration::ZERO,
            blocked_pause: Duration::ZERO,
            politeness_delay: Duration::ZERO,
            politeness_jitter: Duration::ZERO,
        }
    }

    /// Backoff before the attempt following failed attempt number `attempt`
    pub fn backoff(&self, attempt: u32, kind: FetchFailureKind) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let mut delay = self.backoff_base.saturating_mul(1 << exponent);
        if delay > self.backoff_max {
            delay = self.backoff_max;
        }
        delay += jitter(self.backoff_jitter);

        if kind == FetchFailureKind::Blocked {
            delay += self.blocked_pause;
        }
        delay
    }

    fn pause(&self) -> Duration {
        self.politeness_delay + jitter(self.politeness_jitter)
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng().random_range(0..=max_ms))
}

/// Wraps a [`FetchPort`] with retries, backoff and request pacing
///
/// `Rejected` failures are returned at once. Everything else is retried
/// until [`RetryPolicy::max_attempts`] is spent.
#[derive(Debug)]
pub struct PoliteFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F> PoliteFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<F: FetchPort> FetchPort for PoliteFetcher<F> {
    async fn fetch(&self, url: &str, policy: &FetchPolicy) -> Result<FetchedPage, FetchFailure> {
        let mut attempt = 0u32;

        let outcome = loop {
            attempt += 1;
            match self.inner.fetch(url, policy).await {
                Ok(page) => break Ok(page),
                Err(failure) => {
                    if !failure.kind.is_retryable() {
                        debug!("Not retrying {}: {}", url, failure);
                        break Err(failure);
                    }

                    if attempt >= self.policy.max_attempts {
                        warn!(
                            attempt,
                            max = self.policy.max_attempts,
                            error = %failure,
                            "Fetch attempts exhausted for {}",
                            url
                        );
                        break Err(failure);
                    }

                    let delay = self.policy.backoff(attempt, failure.kind);
                    warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        ?delay,
                        error = %failure,
                        "Fetch of {} failed; backing off",
                        url
                    );
                    sleep(delay).await;
                }
            }
        };

        let pause = self.policy.pause();
        if !pause.is_zero() {
            sleep(pause).await;
        }

        outcome
    }
}
