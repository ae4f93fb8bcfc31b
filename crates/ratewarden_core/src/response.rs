//! The capability surface transports must produce.

use ratewarden_error::{RatewardenResult, TransportError};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use url::Url;

/// Minimal response shape the engine consumes: status, headers, body.
///
/// Any transport adapter (async client, blocking client, mock) satisfies the
/// engine by producing this type; the engine never touches the underlying
/// client's response object.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, exactly as received.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Vec<u8>,
    /// Final URL the response was served from.
    pub url: Url,
}

impl TransportResponse {
    /// Assemble a response from its parts.
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>, url: Url) -> Self {
        Self {
            status,
            headers,
            body,
            url,
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// A header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The body deserialized as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> RatewardenResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| TransportError::new(format!("response body is not valid JSON: {e}")).into())
    }
}
