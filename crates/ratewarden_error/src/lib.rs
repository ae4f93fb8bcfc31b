//! Error types for the Ratewarden library.
//!
//! This crate provides the foundation error types used throughout the
//! Ratewarden workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern for clean error
//! handling:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use ratewarden_error::{RatewardenResult, TransportError};
//!
//! fn fetch_data() -> RatewardenResult<String> {
//!     Err(TransportError::new("Connection refused"))?
//! }
//!
//! match fetch_data() {
//!     Ok(data) => println!("Got: {}", data),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admission;
mod config;
mod detect;
mod error;
mod retry;
mod storage;
mod transport;

pub use admission::{AdmissionError, AdmissionErrorKind};
pub use config::ConfigError;
pub use detect::DetectError;
pub use error::{RatewardenError, RatewardenErrorKind, RatewardenResult};
pub use retry::RetryExhaustedError;
pub use storage::{StorageError, StorageErrorKind};
pub use transport::TransportError;
