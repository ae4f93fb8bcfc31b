//! Storage error types.

use std::fmt;

/// Error kinds for limit-store operations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageErrorKind {
    /// The backend cannot be reached. Never masked as "no limit".
    Unavailable(String),
    /// The backend rejected or failed an operation.
    Backend(String),
    /// Stored state failed to deserialize.
    Corrupt(String),
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageErrorKind::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            StorageErrorKind::Backend(msg) => write!(f, "Backend error: {}", msg),
            StorageErrorKind::Corrupt(msg) => write!(f, "Corrupt state: {}", msg),
        }
    }
}

/// Storage error with location tracking.
#[derive(Debug, Clone)]
pub struct StorageError {
    kind: StorageErrorKind,
    line: u32,
    file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create an `Unavailable` error.
    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Unavailable(message.into()))
    }

    /// Create a `Backend` error.
    #[track_caller]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Backend(message.into()))
    }

    /// Create a `Corrupt` error.
    #[track_caller]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Corrupt(message.into()))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StorageErrorKind {
        &self.kind
    }

    /// Whether this error means the backend is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self.kind, StorageErrorKind::Unavailable(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for StorageError {}

impl<T> From<T> for StorageError
where
    T: Into<StorageErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StorageErrorKind {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageErrorKind::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageErrorKind::Corrupt(err.to_string())
            }
            other => StorageErrorKind::Backend(other.to_string()),
        }
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for StorageErrorKind {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            StorageErrorKind::Unavailable(err.to_string())
        } else if err.is_unrecoverable_error() {
            StorageErrorKind::Unavailable(err.to_string())
        } else {
            StorageErrorKind::Backend(err.to_string())
        }
    }
}
