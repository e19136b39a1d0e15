//! Bounded retries with growing timeouts and exponential backoff

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RetryConfig;
use crate::error::ProviderError;
use crate::relay::message::BackendId;

/// Retry policy applied around every backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Timeout of the first attempt
    pub base_timeout: Duration,
    /// Added to the timeout on every further attempt
    pub timeout_step: Duration,
    /// Sleep after attempt `i` is `backoff_base * 2^i`
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_timeout: Duration::from_millis(20_000),
            timeout_step: Duration::from_millis(10_000),
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_timeout: Duration::from_millis(config.base_timeout_ms),
            timeout_step: Duration::from_millis(config.timeout_step_ms),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }
}

impl RetryPolicy {
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout + self.timeout_step.saturating_mul(attempt)
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `call` until it succeeds or the attempts are exhausted.
    ///
    /// `call` receives the timeout for the current attempt. Every failure kind
    /// is retried the same way, including ones that cannot succeed on retry.
    pub async fn attempt<F, Fut>(&self, backend: BackendId, mut call: F) -> Result<String, RetryFailure>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<String, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            let timeout = self.timeout_for(attempt);
            match call(timeout).await {
                Ok(text) => return Ok(text),
                Err(err) if attempt >= self.max_retries => {
                    warn!(
                        backend = %backend,
                        attempts = attempt + 1,
                        timeout_ms = timeout.as_millis() as u64,
                        error = %err,
                        "Backend failed on final attempt"
                    );
                    return Err(RetryFailure {
                        backend,
                        attempts: attempt + 1,
                        timeout,
                        last: err,
                    });
                }
                Err(err) => {
                    let wait = self.backoff_for(attempt);
                    // TODO: stop early on non-retryable failures (plain 4xx) once clients can tell them apart.
                    info!(
                        backend = %backend,
                        attempt = attempt + 1,
                        retryable = err.is_retryable(),
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "Backend attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// All attempts against one backend failed.
///
/// Displays as the inline error reply, e.g. `(error from Gpt: timeout after 40000ms)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub backend: BackendId,
    pub attempts: u32,
    /// Timeout of the last attempt
    pub timeout: Duration,
    pub last: ProviderError,
}

impl RetryFailure {
    pub fn reason(&self) -> String {
        if self.last.is_timeout() {
            format!("timeout after {}ms", self.timeout.as_millis())
        } else {
            self.last.to_string()
        }
    }
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(error from {}: {})",
            self.backend.display_name(),
            self.reason()
        )
    }
}

impl std::error::Error for RetryFailure {}
