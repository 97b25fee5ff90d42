//! # Collaborator Bridge Traits
//!
//! Narrow contracts between the reconciliation core and the collaborators it
//! drives but does not own.
//!
//! ## Overview
//!
//! The sync engine talks to its surroundings through a handful of small
//! traits. Each one can be backed by a production implementation (SQLite,
//! system time, a host logger) or by a fake in tests.
//!
//! ## Traits
//!
//! - [`KeyValueCache`](cache::KeyValueCache) - Short-lived key/value storage used to
//!   remember which item identifiers were present during the previous sync run
//! - [`Clock`](time::Clock) - Time source, injectable for deterministic checksums
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Provider
//! implementations convert their own error types into it so that the sync
//! engine sees one uniform failure type for "the collaborator could not do
//! it".
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so implementations can be shared across
//! tokio tasks behind an `Arc`.

pub mod cache;
pub mod error;
pub mod time;

pub use error::BridgeError;

pub use cache::{get_or_default, put, KeyValueCache};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
