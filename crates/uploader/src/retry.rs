//! Bounded retry with exponential backoff.
//!
//! Every network call in an upload goes through [`RetryExecutor`]. Transient
//! failures are retried after `base_delay × 2^(attempt-1)`; anything else is
//! returned immediately. Both the call and the backoff sleep race the
//! upload's cancellation token.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::types::{EventSink, RetryOperation, UploadEvent};

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for TransportError {
    fn is_transient(&self) -> bool {
        TransportError::is_transient(self)
    }
}

/// Attempt limit and base delay for one kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay after the given failed attempt (1-based): 1×, 2×, 4×, … base.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay().saturating_mul(1u32 << exp)
    }
}

/// Successful result plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

impl<T> Attempted<T> {
    /// Failed attempts before the success.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Why a retried operation gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Non-retryable failure, or the last transient failure once attempts ran out.
    #[error("failed after {attempts} attempt(s): {error}")]
    Failed { attempts: u32, error: E },

    #[error("cancelled")]
    Cancelled,
}

/// Runs one operation under a [`RetryPolicy`].
pub struct RetryExecutor<'a> {
    policy: RetryPolicy,
    operation: RetryOperation,
    cancel: &'a CancellationToken,
    events: &'a EventSink,
}

impl<'a> RetryExecutor<'a> {
    pub fn new(
        policy: RetryPolicy,
        operation: RetryOperation,
        cancel: &'a CancellationToken,
        events: &'a EventSink,
    ) -> Self {
        Self {
            policy,
            operation,
            cancel,
            events,
        }
    }

    /// Calls `op` until it succeeds, fails permanently, runs out of
    /// attempts, or the upload is cancelled.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<Attempted<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RetryError::Cancelled),
                r = op() => r,
            };

            let error = match result {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                debug!(
                    operation = %self.operation,
                    attempt,
                    error = %error,
                    "non-retryable failure"
                );
                return Err(RetryError::Failed {
                    attempts: attempt,
                    error,
                });
            }

            if attempt >= max_attempts {
                warn!(
                    operation = %self.operation,
                    attempts = attempt,
                    error = %error,
                    "retries exhausted"
                );
                return Err(RetryError::Failed {
                    attempts: attempt,
                    error,
                });
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                operation = %self.operation,
                attempt,
                max_attempts,
                delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
                error = %error,
                "transient failure, backing off"
            );
            self.events.emit(UploadEvent::Retrying {
                operation: self.operation,
                attempt,
                delay,
                error: error.to_string(),
            });

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
