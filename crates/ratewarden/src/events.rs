//! Request-outcome events for metrics consumers.

use chrono::{DateTime, Utc};
use ratewarden_core::{EndpointKey, RateLimitDescriptor};

/// One completed dispatch, as seen by the limiter.
///
/// Metrics and CLI collaborators subscribe via `RateLimiter::events` and do
/// their own aggregation and formatting; the limiter only reports what
/// happened. Lagging subscribers miss events rather than slowing requests.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// Endpoint the call targeted.
    pub key: EndpointKey,
    /// Response status code.
    pub status: u16,
    /// Descriptor that governed admission at the time of the call, if any
    /// had been recorded.
    pub descriptor: Option<RateLimitDescriptor>,
    /// When the response was observed.
    pub at: DateTime<Utc>,
}
