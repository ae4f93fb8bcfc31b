//! Retry and backoff policies for rate-limited HTTP calls.
//!
//! [`RetryHandler`] wraps a zero-argument unit of work (typically the
//! limiter's `request` call) and re-executes it on retryable outcomes:
//! responses whose status is in the configured set, and transient transport
//! errors. Delays follow the configured [`BackoffStrategy`], optionally
//! jittered.
//!
//! Retry delay is failure recovery; the limiter's own admission WAIT is
//! pacing. The two layers are independent and may both fire in sequence for
//! one logical call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod handler;
mod schedule;

pub use config::{BackoffStrategy, RetryConfig, RetryConfigBuilder};
pub use handler::RetryHandler;
pub use schedule::BackoffSchedule;
