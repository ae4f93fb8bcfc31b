//! Admission check results.

use ratewarden_error::StorageError;
use std::time::Duration;

/// Explicit result of an admission check.
///
/// Replaces exception-driven "rate limit exceeded" control flow: the
/// orchestrator's state machine consumes these variants directly.
#[derive(Debug)]
pub enum AdmissionDecision {
    /// The call may be dispatched now.
    Admitted,
    /// The call must wait before re-checking admission.
    MustWait(Duration),
    /// The backing store could not answer; never treated as "no limit".
    Unavailable(StorageError),
}

impl AdmissionDecision {
    /// Whether the decision admits the call.
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted)
    }
}
