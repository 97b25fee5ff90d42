//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the library crates:
//! - Logging and tracing setup
//! - Configuration management
//! - The event bus carrying sync status, provider and library events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
