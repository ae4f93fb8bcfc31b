//! Retry exhaustion error types.

use crate::RatewardenError;
use std::fmt;

/// Error surfaced when a retry budget is exhausted.
///
/// Carries the last classified failure rather than a synthetic message:
/// either the terminal HTTP status (when the final attempt produced a
/// response with a retryable status) or the final error as `source`.
#[derive(Debug)]
pub struct RetryExhaustedError {
    /// Number of attempts made, including the first.
    pub attempts: u32,
    /// Status of the final response, when the last failure was status-classified.
    pub last_status: Option<u16>,
    /// The final error, when the last failure was a transient error.
    pub source: Option<Box<RatewardenError>>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl RetryExhaustedError {
    /// Exhaustion whose final attempt returned a retryable HTTP status.
    #[track_caller]
    pub fn from_status(attempts: u32, status: u16) -> Self {
        let location = std::panic::Location::caller();
        Self {
            attempts,
            last_status: Some(status),
            source: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Exhaustion whose final attempt raised a transient error.
    #[track_caller]
    pub fn from_error(attempts: u32, source: RatewardenError) -> Self {
        let location = std::panic::Location::caller();
        Self {
            attempts,
            last_status: None,
            source: Some(Box::new(source)),
            line: location.line(),
            file: location.file(),
        }
    }
}

impl fmt::Display for RetryExhaustedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.last_status, &self.source) {
            (Some(status), _) => write!(
                f,
                "Retry Exhausted after {} attempts: last status {} at line {} in {}",
                self.attempts, status, self.line, self.file
            ),
            (None, Some(source)) => write!(
                f,
                "Retry Exhausted after {} attempts: {} at line {} in {}",
                self.attempts, source, self.line, self.file
            ),
            (None, None) => write!(
                f,
                "Retry Exhausted after {} attempts at line {} in {}",
                self.attempts, self.line, self.file
            ),
        }
    }
}

impl std::error::Error for RetryExhaustedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
