//! Bounded retry with a fixed delay
//!
//! One reusable wrapper for every fallible external call: the per-chunk model
//! request and the per-ticket create-issue request both go through here.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// How many times to try an operation and how long to wait between tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (0 is treated as 1)
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Policy for tracker create-issue calls, independent of configuration
    pub const fn tracker() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Details of one failed attempt, handed to the failure callback
#[derive(Debug)]
pub struct FailedAttempt<'a, E> {
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: &'a E,
    /// `Some(delay)` when another attempt follows after sleeping `delay`
    pub retry_in: Option<Duration>,
}

/// All attempts failed; carries the last observed error
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.last
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {} attempts: {}", self.attempts, self.last)
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last)
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up
///
/// `operation` receives the 1-based attempt number.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    with_retry_notify(policy, label, operation, |_| {}).await
}

/// Like [`with_retry`], calling `on_failure` after every failed attempt
pub async fn with_retry_notify<T, E, F, Fut, N>(
    policy: RetryPolicy,
    label: &str,
    mut operation: F,
    mut on_failure: N,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    N: FnMut(&FailedAttempt<'_, E>),
{
    let max_attempts = policy.attempts();
    debug!(%label, max_attempts, delay_ms = policy.delay.as_millis() as u64, "with_retry: called");

    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                debug!(%label, attempt, "with_retry: success");
                return Ok(value);
            }
            Err(error) => {
                let retry_in = (attempt < max_attempts).then_some(policy.delay);
                warn!(%label, attempt, max_attempts, error = %error, "with_retry: attempt failed");
                on_failure(&FailedAttempt {
                    attempt,
                    max_attempts,
                    error: &error,
                    retry_in,
                });

                match retry_in {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        debug!(%label, attempts = attempt, "with_retry: exhausted");
                        return Err(RetryError {
                            attempts: attempt,
                            last: error,
                        });
                    }
                }
            }
        }
    }
}
