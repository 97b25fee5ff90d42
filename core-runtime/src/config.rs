//! # Core Configuration Module
//!
//! Builder-based configuration for the media library service.
//!
//! ## Overview
//!
//! [`CoreConfig`] carries the database location, sync cadence, channel sizes
//! and feature switches. [`CoreConfigBuilder::build`] fills in defaults and
//! validates the result, failing fast with an actionable message.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/medialib/library.db")
//!     .sync_interval(Duration::from_secs(60 * 60))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.initial_sync_delay, Duration::from_secs(10));
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // database path is required
//! CoreConfig::builder().build().expect("missing database path");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use bridge_traits::time::{Clock, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Time between periodic full syncs.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);

/// Delay before the first periodic sync after startup.
pub const DEFAULT_INITIAL_SYNC_DELAY: Duration = Duration::from_secs(10);

/// Maximum number of sync requests waiting for the worker.
pub const DEFAULT_SYNC_QUEUE_CAPACITY: usize = 64;

/// Core configuration for the media library service.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub database_path: PathBuf,

    /// Time between periodic full syncs
    pub sync_interval: Duration,

    /// Delay before the first periodic sync
    pub initial_sync_delay: Duration,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,

    /// Capacity of the sync request queue
    pub sync_queue_capacity: usize,

    /// Expiry for cached prior identifier sets. `None` keeps them until the
    /// next successful run overwrites them.
    pub prior_ids_ttl: Option<Duration>,

    pub features: FeatureFlags,

    /// Time source for playlist checksums
    pub clock: Arc<dyn Clock>,

    /// Logging setup, applied by the service on bootstrap when present
    pub logging: Option<LoggingConfig>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("sync_interval", &self.sync_interval)
            .field("initial_sync_delay", &self.initial_sync_delay)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("sync_queue_capacity", &self.sync_queue_capacity)
            .field("prior_ids_ttl", &self.prior_ids_ttl)
            .field("features", &self.features)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Feature flags toggling optional sync behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run a full sync of every provider on a fixed interval
    pub enable_periodic_sync: bool,

    /// Queue a full sync of a provider as soon as it registers
    pub sync_on_provider_registered: bool,

    /// Treat an empty catalog listing as authoritative and remove every prior
    /// library membership for that provider and media type
    pub purge_on_empty_listing: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_periodic_sync: true,
            sync_on_provider_registered: true,
            purge_on_empty_listing: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks:
    /// - Database path is not empty
    /// - Interval, buffer and queue sizes are non-zero
    /// - The initial delay is shorter than the interval
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.sync_interval.is_zero() {
            return Err(Error::Config(
                "Sync interval must be greater than zero. \
                 Disable periodic sync with .enable_periodic_sync(false) instead."
                    .to_string(),
            ));
        }

        if self.initial_sync_delay >= self.sync_interval {
            return Err(Error::Config(format!(
                "Initial sync delay ({:?}) must be shorter than the sync interval ({:?})",
                self.initial_sync_delay, self.sync_interval
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.sync_queue_capacity == 0 {
            return Err(Error::Config(
                "Sync queue capacity must be greater than 0".to_string(),
            ));
        }

        if let Some(ttl) = self.prior_ids_ttl {
            if ttl < self.sync_interval {
                return Err(Error::Config(format!(
                    "Prior id TTL ({:?}) is shorter than the sync interval ({:?}); \
                     every periodic run would re-add the full catalog. \
                     Raise the TTL or leave it unset.",
                    ttl, self.sync_interval
                )));
            }
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    sync_interval: Option<Duration>,
    initial_sync_delay: Option<Duration>,
    event_buffer_size: Option<usize>,
    sync_queue_capacity: Option<usize>,
    prior_ids_ttl: Option<Duration>,
    features: FeatureFlags,
    clock: Option<Arc<dyn Clock>>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the database path. Use `":memory:"` for a throwaway library.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().database_path(":memory:");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn initial_sync_delay(mut self, delay: Duration) -> Self {
        self.initial_sync_delay = Some(delay);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn sync_queue_capacity(mut self, capacity: usize) -> Self {
        self.sync_queue_capacity = Some(capacity);
        self
    }

    pub fn prior_ids_ttl(mut self, ttl: Duration) -> Self {
        self.prior_ids_ttl = Some(ttl);
        self
    }

    pub fn enable_periodic_sync(mut self, enabled: bool) -> Self {
        self.features.enable_periodic_sync = enabled;
        self
    }

    pub fn sync_on_provider_registered(mut self, enabled: bool) -> Self {
        self.features.sync_on_provider_registered = enabled;
        self
    }

    pub fn purge_on_empty_listing(mut self, enabled: bool) -> Self {
        self.features.purge_on_empty_listing = enabled;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Injects a time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let config = CoreConfig {
            database_path,
            sync_interval: self.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL),
            initial_sync_delay: self
                .initial_sync_delay
                .unwrap_or(DEFAULT_INITIAL_SYNC_DELAY),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            sync_queue_capacity: self
                .sync_queue_capacity
                .unwrap_or(DEFAULT_SYNC_QUEUE_CAPACITY),
            prior_ids_ttl: self.prior_ids_ttl,
            features: self.features,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logging: self.logging,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::ManualClock;

    #[test]
    fn test_builder_defaults() {
        let config = CoreConfig::builder()
            .database_path("/tmp/library.db")
            .build()
            .unwrap();

        assert_eq!(config.sync_interval, DEFAULT_SYNC_INTERVAL);
        assert_eq!(config.initial_sync_delay, DEFAULT_INITIAL_SYNC_DELAY);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.sync_queue_capacity, DEFAULT_SYNC_QUEUE_CAPACITY);
        assert_eq!(config.prior_ids_ttl, None);
        assert_eq!(config.features, FeatureFlags::default());
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_missing_database_path() {
        let result = CoreConfig::builder().build();
        match result {
            Err(Error::Config(message)) => assert!(message.contains(".database_path()")),
            other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_database_path() {
        let result = CoreConfig::builder().database_path("").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = CoreConfig::builder()
            .database_path(":memory:")
            .sync_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_initial_delay_must_be_shorter_than_interval() {
        let result = CoreConfig::builder()
            .database_path(":memory:")
            .sync_interval(Duration::from_secs(5))
            .initial_sync_delay(Duration::from_secs(5))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let buffer = CoreConfig::builder()
            .database_path(":memory:")
            .event_buffer_size(0)
            .build();
        assert!(matches!(buffer, Err(Error::Config(_))));

        let queue = CoreConfig::builder()
            .database_path(":memory:")
            .sync_queue_capacity(0)
            .build();
        assert!(matches!(queue, Err(Error::Config(_))));
    }

    #[test]
    fn test_short_ttl_rejected() {
        let result = CoreConfig::builder()
            .database_path(":memory:")
            .prior_ids_ttl(Duration::from_secs(60))
            .build();
        match result {
            Err(Error::Config(message)) => assert!(message.contains("TTL")),
            other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_feature_toggles_and_clock() {
        let clock = Arc::new(ManualClock::at_millis(42));
        let config = CoreConfig::builder()
            .database_path(":memory:")
            .enable_periodic_sync(false)
            .purge_on_empty_listing(false)
            .clock(clock)
            .build()
            .unwrap();

        assert!(!config.features.enable_periodic_sync);
        assert!(config.features.sync_on_provider_registered);
        assert!(!config.features.purge_on_empty_listing);
        assert_eq!(config.clock.unix_timestamp_millis(), 42);
    }
}
