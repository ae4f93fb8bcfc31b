//! Header detection error types.

/// Error describing a rate-limit header that was present but unparsable.
///
/// Detection failures are local to the detector: they are logged and the
/// response is treated as carrying no limit information. They never
/// propagate to callers.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Detection Error: header {:?} has unparsable value {:?} at line {} in {}", header, value, line, file)]
pub struct DetectError {
    /// Name of the offending header
    pub header: String,
    /// Raw value that failed to parse
    pub value: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl DetectError {
    /// Create a new DetectError for a header/value pair at the current location.
    #[track_caller]
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            header: header.into(),
            value: value.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
