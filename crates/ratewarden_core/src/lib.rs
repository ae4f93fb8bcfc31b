//! Core data types for the Ratewarden rate-limit state engine.
//!
//! This crate holds the value types shared by the storage backends, the
//! retry layer, and the limiter orchestrator:
//!
//! - [`RateLimitDescriptor`] - normalized representation of a server-reported
//!   rate limit window, and its read-only [`LimitStatus`] view
//! - [`TokenBucket`] - token-bucket admission state with deterministic
//!   refill/consume math
//! - [`EndpointKey`] - normalized endpoint identifier used to index storage
//! - [`AdmissionDecision`] - explicit result of an admission check
//! - [`TransportResponse`] - the minimal capability surface any transport
//!   adapter must produce
//! - [`Clock`] - injectable time source so backends can share one logical
//!   clock

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admission;
mod bucket;
mod clock;
mod descriptor;
mod key;
mod response;

pub use admission::AdmissionDecision;
pub use bucket::{ConsumeOutcome, Pace, TokenBucket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use descriptor::{LimitStatus, RateLimitDescriptor};
pub use key::EndpointKey;
pub use response::TransportResponse;
