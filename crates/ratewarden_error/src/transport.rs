//! Transport error types.

/// Opaque passthrough error for failures raised by the injected HTTP client.
///
/// The state engine never interprets these beyond propagating them; retry
/// layers may classify them as transient when configured to.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Transport Error: {} at line {} in {}", message, line, file)]
pub struct TransportError {
    /// The underlying error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl TransportError {
    /// Create a new TransportError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratewarden_error::TransportError;
    ///
    /// let err = TransportError::new("Connection refused");
    /// assert!(err.message.contains("Connection refused"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
