//! Bounded retry with exponential backoff for calls to remote dependencies.
//!
//! The executor only knows about attempts and delays. Callers decide which
//! failures are transient through a predicate, and the wait goes through a
//! [`Sleeper`] so schedules can be checked without touching the wall clock.

use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum RetryPolicyError {
    #[error("max_attempts must be at least 1")]
    NoAttempts,

    #[error("backoff_multiplier must be a finite number >= 1, got {0}")]
    InvalidMultiplier(f64),
}

/// How many times to call and how long to wait in between.
///
/// Attempts are 1-indexed: the wait before attempt `n + 1` is
/// `base_delay * backoff_multiplier^(n - 1)`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        backoff_multiplier: f64,
    ) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError::NoAttempts);
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(RetryPolicyError::InvalidMultiplier(backoff_multiplier));
        }

        Ok(Self {
            max_attempts,
            base_delay,
            backoff_multiplier,
        })
    }

    /// A policy that calls exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Delay to wait after the given (1-indexed) failed attempt.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    /// Sum of every wait the policy can impose on a single call.
    pub fn total_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|a| self.delay_after(a))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Suspends the current task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Cooperative wait on the tokio timer; other tasks keep running.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested waits and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

/// Call `f` until it succeeds, fails with a non-transient error, or the policy
/// runs out of attempts. The last error is returned unchanged.
///
/// # Example
/// ```ignore
/// let text = retry_with_backoff(
///     &RetryPolicy::default(),
///     &TokioSleeper,
///     "generate_content",
///     |err: &ProviderError| err.status_code() == Some(429),
///     || async { provider.generate(&prompt).await },
/// )
/// .await?;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation_name: &str,
    is_transient: P,
    f: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "Call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_transient(&err) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Call failed with non-retryable error"
                    );
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Call failed after max attempts"
                    );
                    return Err(err);
                }

                let backoff = policy.delay_after(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    backoff_ms = backoff.as_millis() as u64,
                    "Call failed, retrying after backoff"
                );

                sleeper.sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// A retry policy bound to a sleeper, shared across requests.
#[derive(Clone)]
pub struct BackoffExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl BackoffExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<F, Fut, T, E, P>(
        &self,
        operation_name: &str,
        is_transient: P,
        f: F,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        retry_with_backoff(
            &self.policy,
            self.sleeper.as_ref(),
            operation_name,
            is_transient,
            f,
        )
        .await
    }
}
