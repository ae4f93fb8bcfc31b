//! Retry drivers for async and blocking callers.

use crate::RetryConfig;
use ratewarden_core::TransportResponse;
use ratewarden_error::{RatewardenError, RatewardenResult, RetryExhaustedError};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// The last classified failure, threaded through the retry loop so
/// exhaustion can surface the real cause.
enum Failure {
    /// Non-retryable error: surfaces immediately, unwrapped.
    Fatal(RatewardenError),
    /// Response with a retryable status.
    Status(u16),
    /// Designated transient error.
    Transient(RatewardenError),
}

/// Drives a retryable unit of work under a [`RetryConfig`].
///
/// Outcomes are classified per attempt: success, retryable failure
/// (response status in the configured set, or a designated transient
/// error), or fatal failure. Fatal failures surface immediately; exhaustion
/// surfaces the last classified failure via
/// [`RetryExhaustedError`], never a synthetic message.
///
/// # Example
///
/// ```rust,ignore
/// let handler = RetryHandler::new(RetryConfig::default());
/// let response = handler
///     .retry_async(|| limiter.request(intent.clone()))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    /// Create a handler from an immutable policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The policy this handler runs.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn classify(&self, outcome: RatewardenResult<TransportResponse>) -> Result<TransportResponse, Failure> {
        match outcome {
            Ok(response) if self.config.is_retryable_status(response.status) => {
                Err(Failure::Status(response.status))
            }
            Ok(response) => Ok(response),
            Err(error) if self.config.is_transient_error(&error) => {
                Err(Failure::Transient(error))
            }
            Err(error) => Err(Failure::Fatal(error)),
        }
    }

    fn exhausted(attempts: u32, failure: Failure) -> RatewardenError {
        match failure {
            Failure::Fatal(error) => error,
            Failure::Status(status) => {
                warn!(attempts, status, "Retry budget exhausted on retryable status");
                RetryExhaustedError::from_status(attempts, status).into()
            }
            Failure::Transient(error) => {
                warn!(attempts, %error, "Retry budget exhausted on transient error");
                RetryExhaustedError::from_error(attempts, error).into()
            }
        }
    }

    /// Execute `operation` with retries, suspending between attempts.
    pub async fn retry_async<F, Fut>(&self, mut operation: F) -> RatewardenResult<TransportResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RatewardenResult<TransportResponse>>,
    {
        let attempts = AtomicU32::new(0);
        let result = Retry::spawn(self.config.schedule(), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let fut = operation();
            async move {
                match self.classify(fut.await) {
                    Ok(response) => {
                        if attempt > 1 {
                            debug!(attempt, "Operation succeeded after retries");
                        }
                        Ok(response)
                    }
                    Err(Failure::Fatal(error)) => {
                        debug!(%error, "Non-retryable failure");
                        Err(RetryError::Permanent(Failure::Fatal(error)))
                    }
                    Err(failure) => {
                        match &failure {
                            Failure::Status(status) => {
                                warn!(attempt, status, "Retryable status, backing off")
                            }
                            Failure::Transient(error) => {
                                warn!(attempt, %error, "Transient error, backing off")
                            }
                            Failure::Fatal(_) => unreachable!(),
                        }
                        Err(RetryError::Transient {
                            err: failure,
                            retry_after: None,
                        })
                    }
                }
            }
        })
        .await;

        result.map_err(|failure| Self::exhausted(attempts.load(Ordering::SeqCst), failure))
    }

    /// Execute `operation` with retries, blocking the thread between
    /// attempts.
    pub fn retry_blocking<F>(&self, mut operation: F) -> RatewardenResult<TransportResponse>
    where
        F: FnMut() -> RatewardenResult<TransportResponse>,
    {
        let mut schedule = self.config.schedule();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let failure = match self.classify(operation()) {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retries");
                    }
                    return Ok(response);
                }
                Err(Failure::Fatal(error)) => {
                    debug!(%error, "Non-retryable failure");
                    return Err(error);
                }
                Err(failure) => failure,
            };
            match schedule.next() {
                Some(delay) => {
                    match &failure {
                        Failure::Status(status) => {
                            warn!(attempt, status, delay = ?delay, "Retryable status, backing off")
                        }
                        Failure::Transient(error) => {
                            warn!(attempt, %error, delay = ?delay, "Transient error, backing off")
                        }
                        Failure::Fatal(_) => unreachable!(),
                    }
                    std::thread::sleep(delay);
                }
                None => return Err(Self::exhausted(attempt, failure)),
            }
        }
    }
}
