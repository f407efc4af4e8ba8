//! Retry policy with configurable backoff
//!
//! Shared by every operation that talks to storage nodes. Provisioning retries
//! transient failures by default; uploads and reads run once unless configured
//! otherwise.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay every time
    Fixed,
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
}

/// Retry policy for a class of node operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff schedule
    #[serde(default)]
    pub backoff: BackoffKind,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff: BackoffKind::Linear,
        }
    }
}

/// Failure after the policy gave up
#[derive(Debug)]
pub struct RetryError {
    /// Attempts actually made
    pub attempts: u32,
    /// The last underlying failure
    pub last: Error,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_attempts: u32, base_delay_ms: u64, backoff: BackoffKind) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay_ms,
            backoff,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            base_delay_ms: 0,
            backoff: BackoffKind::Fixed,
        }
    }

    /// Delay to wait after the given (1-based) attempt failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let ms = match self.backoff {
            BackoffKind::Fixed => self.base_delay_ms,
            BackoffKind::Linear => self.base_delay_ms.saturating_mul(attempt as u64),
            BackoffKind::Exponential => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                self.base_delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms)
    }

    /// Start a backoff sequence for one operation
    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            policy: self,
            attempt: 0,
        }
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    ///
    /// `label` is used only for logging.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> std::result::Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        let mut backoff = self.backoff();

        loop {
            backoff.attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => {
                    error!("{} failed permanently: {}", label, e);
                    return Err(RetryError {
                        attempts: backoff.attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    if let Some(delay) = backoff.next_delay() {
                        warn!("{} failed, retrying in {:?}: {}", label, delay, e);
                        tokio::time::sleep(delay).await;
                    } else {
                        error!("{} failed after {} attempt(s): {}", label, backoff.attempt, e);
                        return Err(RetryError {
                            attempts: backoff.attempt,
                            last: e,
                        });
                    }
                }
            }
        }
    }
}

/// Delay sequence for a single operation
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
}

impl Backoff<'_> {
    /// Record a failed attempt; returns the delay before the next one, or
    /// `None` once the attempt ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        Some(self.policy.delay_after(self.attempt))
    }
}
