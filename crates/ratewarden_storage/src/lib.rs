//! Pluggable limit-state storage for the Ratewarden engine.
//!
//! One contract, three consistency tiers:
//!
//! - [`MemoryStore`] - single-process map behind an async lock
//! - [`SqliteStore`] - embedded-durable SQLite file, every mutation in one
//!   transaction (requires the `sqlite` feature, on by default)
//! - [`RedisStore`] - shared external store; refill-then-consume runs as a
//!   single server-side Lua script (requires the `redis` feature, on by
//!   default)
//!
//! All backends produce identical admission decisions for identical
//! operation sequences under a shared logical clock: time is always a
//! parameter, never read inside the store. Backends are selected by URI via
//! [`connect`]; unrecognized schemes fail at construction.
//!
//! The memory and SQLite backends are confined to one process. Only the
//! Redis backend is safe for multi-process or multi-host sharing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod memory;
#[cfg(feature = "redis")]
mod redis_store;
#[cfg(feature = "sqlite")]
mod sqlite;
mod store;
mod uri;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{LimitStore, StoreOptions};
pub use uri::{StoreUri, connect};
