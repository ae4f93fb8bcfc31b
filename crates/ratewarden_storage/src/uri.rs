//! Backend selection by URI.

use crate::{LimitStore, MemoryStore, StoreOptions};
use ratewarden_error::{ConfigError, RatewardenResult};
use std::sync::Arc;

/// Parsed storage backend selector.
///
/// Recognized forms:
///
/// - `memory://` - in-process map (the default)
/// - `sqlite://PATH` - embedded SQLite file at `PATH` (relative or
///   absolute); `sqlite://:memory:` opens a transient in-memory database
/// - `redis://HOST:PORT/DB` - shared Redis instance, passed through to the
///   client verbatim
///
/// Anything else fails at construction, not on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    /// In-process map.
    Memory,
    /// Embedded SQLite database at the given path.
    Sqlite(String),
    /// Redis connection URL.
    Redis(String),
}

impl StoreUri {
    /// Parse a backend URI, rejecting unrecognized schemes.
    pub fn parse(uri: &str) -> RatewardenResult<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() || trimmed == "memory" || trimmed == "memory://" {
            return Ok(StoreUri::Memory);
        }
        if let Some(path) = trimmed.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(ConfigError::new("sqlite storage URI is missing a path").into());
            }
            return Ok(StoreUri::Sqlite(path.to_string()));
        }
        if trimmed.starts_with("redis://") || trimmed.starts_with("rediss://") {
            return Ok(StoreUri::Redis(trimmed.to_string()));
        }
        Err(ConfigError::new(format!("unrecognized storage scheme: {trimmed:?}")).into())
    }
}

/// Connect a storage backend from its URI.
///
/// # Examples
///
/// ```
/// use ratewarden_storage::{StoreOptions, connect};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ratewarden_error::RatewardenResult<()> {
/// let store = connect("memory://", StoreOptions::default()).await?;
/// # let _ = store;
/// # Ok(())
/// # }
/// ```
pub async fn connect(uri: &str, options: StoreOptions) -> RatewardenResult<Arc<dyn LimitStore>> {
    match StoreUri::parse(uri)? {
        StoreUri::Memory => Ok(Arc::new(MemoryStore::new(options))),
        StoreUri::Sqlite(path) => {
            #[cfg(feature = "sqlite")]
            {
                Ok(Arc::new(crate::SqliteStore::open(&path, options).await?))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = path;
                Err(ConfigError::new(
                    "sqlite storage requires building with the `sqlite` feature",
                )
                .into())
            }
        }
        StoreUri::Redis(url) => {
            #[cfg(feature = "redis")]
            {
                Ok(Arc::new(crate::RedisStore::connect(&url, options).await?))
            }
            #[cfg(not(feature = "redis"))]
            {
                let _ = url;
                Err(ConfigError::new(
                    "redis storage requires building with the `redis` feature",
                )
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_backends() {
        assert_eq!(StoreUri::parse("memory://").unwrap(), StoreUri::Memory);
        assert_eq!(StoreUri::parse("").unwrap(), StoreUri::Memory);
        assert_eq!(
            StoreUri::parse("sqlite://rate_limits.db").unwrap(),
            StoreUri::Sqlite("rate_limits.db".to_string())
        );
        assert_eq!(
            StoreUri::parse("redis://localhost:6379/0").unwrap(),
            StoreUri::Redis("redis://localhost:6379/0".to_string())
        );
    }

    #[test]
    fn unknown_scheme_fails_fast() {
        assert!(StoreUri::parse("postgres://localhost/limits").is_err());
        assert!(StoreUri::parse("sqlite://").is_err());
    }
}
