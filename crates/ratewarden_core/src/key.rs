//! Endpoint key normalization.

use ratewarden_error::{ConfigError, RatewardenResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Normalized identifier for an endpoint, used to index limit storage.
///
/// Two requests against the same logical endpoint must resolve to the same
/// key regardless of query strings, fragments, host casing, or default
/// ports. Normalization is enforced here, inside the engine, rather than
/// left to callers.
///
/// # Examples
///
/// ```
/// use ratewarden_core::EndpointKey;
/// use url::Url;
///
/// let a = EndpointKey::normalize(&Url::parse("https://API.example.com:443/v1/users?page=2").unwrap());
/// let b = EndpointKey::normalize(&Url::parse("https://api.example.com/v1/users/?page=9#top").unwrap());
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "https://api.example.com/v1/users");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct EndpointKey(String);

impl EndpointKey {
    /// Normalize a URL into an endpoint key.
    ///
    /// Keeps `(scheme, host[:port], path)`, drops query and fragment, lowers
    /// the host, elides default ports, and trims trailing slashes from the
    /// path.
    pub fn normalize(url: &Url) -> Self {
        let mut key = String::new();
        key.push_str(url.scheme());
        key.push_str("://");
        if let Some(host) = url.host_str() {
            key.push_str(&host.to_ascii_lowercase());
        }
        // Url::port() is None for scheme-default ports.
        if let Some(port) = url.port() {
            key.push(':');
            key.push_str(&port.to_string());
        }
        let path = url.path().trim_end_matches('/');
        key.push_str(path);
        Self(key)
    }

    /// Resolve a caller-supplied endpoint string into a key.
    ///
    /// Accepts a full URL, or a bare `host/path` form which is assumed to be
    /// `https`, so `api.example.com` and `https://api.example.com/` resolve
    /// identically.
    pub fn resolve(endpoint: &str) -> RatewardenResult<Self> {
        let trimmed = endpoint.trim();
        let url = if trimmed.contains("://") {
            Url::parse(trimmed)
        } else {
            Url::parse(&format!("https://{trimmed}"))
        }
        .map_err(|e| ConfigError::new(format!("invalid endpoint {trimmed:?}: {e}")))?;
        Ok(Self::normalize(&url))
    }

    /// Wrap an already-normalized key string, e.g. one loaded back from
    /// storage. Performs no normalization.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
