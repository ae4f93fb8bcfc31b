//! Self-governing rate limits for outbound HTTP calls.
//!
//! Ratewarden sits in front of an injected HTTP client, infers the rate
//! limit contract an upstream API is enforcing from its response headers,
//! persists that state, and uses it to admit, delay, or retry subsequent
//! calls - the caller never manages limits manually.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ratewarden::{LimiterOptions, RateLimiter, RequestIntent};
//!
//! # #[tokio::main]
//! # async fn main() -> ratewarden_error::RatewardenResult<()> {
//! let limiter = RateLimiter::new(LimiterOptions::default()).await?;
//!
//! // Limits are detected from response headers and honored automatically.
//! let response = limiter
//!     .request(RequestIntent::get("https://api.github.com/users/octocat")?)
//!     .await?;
//!
//! if let Some(status) = limiter.status("https://api.github.com/users/octocat").await? {
//!     println!("{} of {} calls left", status.remaining, status.limit);
//! }
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage backends
//!
//! Limit state lives behind the [`LimitStore`] contract, selected by URI at
//! construction: `memory://` (default, in-process), `sqlite://PATH`
//! (durable across restarts), or `redis://HOST:PORT/DB` (shared across
//! processes). Unrecognized schemes fail at construction.
//!
//! ## Blocking callers
//!
//! [`BlockingRateLimiter`] exposes the same operations without an async
//! runtime, wrapping the async limiter over a dedicated current-thread
//! runtime.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod blocking;
mod config;
pub mod detector;
mod events;
mod limiter;
pub mod telemetry;
mod transport;

pub use blocking::BlockingRateLimiter;
pub use config::{LimiterSettings, RatewardenConfig, RetrySettings, StorageSettings};
pub use detector::DetectedLimit;
pub use events::RequestOutcome;
pub use limiter::{LimiterOptions, LimiterOptionsBuilder, RateLimiter};
pub use transport::{
    MockTransport, ReqwestBlockingTransport, ReqwestTransport, RequestIntent,
    RequestIntentBuilder, Transport,
};

pub use ratewarden_core::{
    AdmissionDecision, Clock, ConsumeOutcome, EndpointKey, LimitStatus, ManualClock, Pace,
    RateLimitDescriptor, SystemClock, TokenBucket, TransportResponse,
};
pub use ratewarden_error::{
    AdmissionError, AdmissionErrorKind, ConfigError, DetectError, RatewardenError,
    RatewardenErrorKind, RatewardenResult, RetryExhaustedError, StorageError, StorageErrorKind,
    TransportError,
};
pub use ratewarden_retry::{BackoffSchedule, BackoffStrategy, RetryConfig, RetryHandler};
pub use ratewarden_storage::{LimitStore, MemoryStore, StoreOptions, StoreUri, connect};

#[cfg(feature = "sqlite")]
pub use ratewarden_storage::SqliteStore;

#[cfg(feature = "redis")]
pub use ratewarden_storage::RedisStore;
