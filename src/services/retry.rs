// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Shared retry policy for outbound Strava calls.
//!
//! One configurable component (attempts, base delay, cap, `Retry-After`
//! awareness) used by the activities, details, and photos paths instead of
//! each call site carrying its own backoff loop. Only upstream rate limits
//! are retried; auth failures and other upstream errors propagate on the
//! first attempt.

use crate::error::AppError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Backoff for the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound for any single sleep, including `Retry-After` hints.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self::new(1, Duration::from_millis(0), Duration::from_millis(0))
    }

    /// Run `op`, retrying on upstream 429 with exponential backoff.
    ///
    /// The sleep before retry N is `base_delay * 2^(N-1)`, replaced by the
    /// upstream `Retry-After` hint when one was sent, and always capped at
    /// `max_delay`. The last error is returned once attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err @ AppError::StravaRateLimited { .. }) if attempt < self.max_attempts => {
                    let retry_after = match &err {
                        AppError::StravaRateLimited { retry_after_secs } => {
                            retry_after_secs.map(Duration::from_secs)
                        }
                        _ => None,
                    };
                    let backoff = self
                        .base_delay
                        .saturating_mul(2u32.saturating_pow(attempt - 1));
                    let delay = retry_after.unwrap_or(backoff).min(self.max_delay);

                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Upstream rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
