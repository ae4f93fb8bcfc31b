//! Top-level error wrapper types.

use crate::{
    AdmissionError, ConfigError, DetectError, RetryExhaustedError, StorageError, TransportError,
};

/// This is the foundation error enum for the Ratewarden workspace.
///
/// # Examples
///
/// ```
/// use ratewarden_error::{RatewardenError, TransportError};
///
/// let transport_err = TransportError::new("Connection failed");
/// let err: RatewardenError = transport_err.into();
/// assert!(format!("{}", err).contains("Transport Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum RatewardenErrorKind {
    /// Transport error (opaque passthrough from the injected client)
    #[from(TransportError)]
    Transport(TransportError),
    /// Storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Admission error (deadline exceeded, cancellation, starvation)
    #[from(AdmissionError)]
    Admission(AdmissionError),
    /// Retry budget exhausted
    #[from(RetryExhaustedError)]
    Retry(RetryExhaustedError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Header detection error (local to the detector, normally swallowed)
    #[from(DetectError)]
    Detect(DetectError),
}

/// Ratewarden error with kind discrimination.
///
/// # Examples
///
/// ```
/// use ratewarden_error::{RatewardenResult, ConfigError};
///
/// fn might_fail() -> RatewardenResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Ratewarden Error: {}", _0)]
pub struct RatewardenError(Box<RatewardenErrorKind>);

impl RatewardenError {
    /// Create a new error from a kind.
    pub fn new(kind: RatewardenErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RatewardenErrorKind {
        &self.0
    }

    /// Consume the error, returning its kind.
    pub fn into_kind(self) -> RatewardenErrorKind {
        *self.0
    }

    /// Whether this error is a storage-unavailable condition.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self.kind(), RatewardenErrorKind::Storage(e) if e.is_unavailable())
    }

    /// Whether this error is an admission deadline/cancellation/starvation.
    pub fn is_admission(&self) -> bool {
        matches!(self.kind(), RatewardenErrorKind::Admission(_))
    }
}

// Generic From implementation for any type that converts to RatewardenErrorKind
impl<T> From<T> for RatewardenError
where
    T: Into<RatewardenErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Ratewarden operations.
///
/// # Examples
///
/// ```
/// use ratewarden_error::{RatewardenResult, TransportError};
///
/// fn fetch_data() -> RatewardenResult<String> {
///     Err(TransportError::new("404 Not Found"))?
/// }
/// ```
pub type RatewardenResult<T> = std::result::Result<T, RatewardenError>;
