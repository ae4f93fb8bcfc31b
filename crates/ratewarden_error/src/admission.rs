//! Admission error types.

use std::fmt;
use std::time::Duration;

/// Error kinds for admission decisions that cannot be satisfied by waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionErrorKind {
    /// The bounded wait budget was exhausted before admission.
    DeadlineExceeded {
        /// Total time spent waiting before giving up.
        waited: Duration,
        /// Additional wait the limiter would have needed.
        outstanding: Duration,
    },
    /// The caller cancelled the request during WAIT or DISPATCH.
    Cancelled,
    /// The pacing bucket is not replenishing (refill rate of zero), so no
    /// amount of waiting admits the call.
    Starved,
}

impl fmt::Display for AdmissionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionErrorKind::DeadlineExceeded { waited, outstanding } => write!(
                f,
                "rate limit deadline exceeded: waited {:.3}s, {:.3}s still required",
                waited.as_secs_f64(),
                outstanding.as_secs_f64()
            ),
            AdmissionErrorKind::Cancelled => write!(f, "request cancelled"),
            AdmissionErrorKind::Starved => {
                write!(f, "pacing bucket is not replenishing")
            }
        }
    }
}

/// Admission error with location tracking.
///
/// Distinct from transport errors: the request was never dispatched.
#[derive(Debug, Clone)]
pub struct AdmissionError {
    kind: AdmissionErrorKind,
    line: u32,
    file: &'static str,
}

impl AdmissionError {
    /// Create a new admission error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: AdmissionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &AdmissionErrorKind {
        &self.kind
    }
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Admission Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for AdmissionError {}

impl<T> From<T> for AdmissionError
where
    T: Into<AdmissionErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}
