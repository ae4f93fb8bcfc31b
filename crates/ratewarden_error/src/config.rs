//! Configuration error types.

/// Configuration error raised at construction time.
///
/// Covers unrecognized storage URIs, malformed TOML, and invalid policy
/// values. These always surface before the first request is issued.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// The underlying error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratewarden_error::ConfigError;
    ///
    /// let err = ConfigError::new("unrecognized storage scheme: ftp://");
    /// assert!(err.message.contains("ftp://"));
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
