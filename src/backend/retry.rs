// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fixed-delay retry for network-level backend failures

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Outcome of a single failed attempt
#[derive(Debug)]
pub enum AttemptError {
    /// Network-level failure; another attempt may succeed
    Transient(String),
    /// Failure that retrying cannot fix; returned as-is
    Terminal(PipelineError),
}

impl From<PipelineError> for AttemptError {
    fn from(err: PipelineError) -> Self {
        AttemptError::Terminal(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails terminally, or the budget is spent.
    ///
    /// `op` receives the 1-based attempt index. There is no delay after the
    /// final attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, AttemptError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            info!("{}: attempt {}/{}", label, attempt, max_attempts);

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{}: succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(AttemptError::Terminal(e)) => {
                    error!("{}: attempt {} failed terminally: {}", label, attempt, e);
                    return Err(e);
                }
                Err(AttemptError::Transient(cause)) => {
                    warn!(
                        "{}: attempt {}/{} failed: {}",
                        label, attempt, max_attempts, cause
                    );
                    last_error = cause;
                    if attempt < max_attempts {
                        sleep(self.delay).await;
                    }
                }
            }
        }

        error!(
            "{}: giving up after {} attempt(s): {}",
            label, max_attempts, last_error
        );
        Err(PipelineError::BackendUnavailable {
            attempts: max_attempts,
            last_error,
        })
    }
}
