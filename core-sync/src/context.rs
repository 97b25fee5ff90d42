//! Shared collaborator handles for the sync components.

use crate::run_registry::RunRegistry;
use bridge_traits::cache::KeyValueCache;
use bridge_traits::time::{Clock, SystemClock};
use core_library::{LibraryStore, MediaResolver, ProviderRegistry};
use core_runtime::events::EventBus;
use std::sync::Arc;

/// Everything a sync component talks to, cheap to clone.
#[derive(Clone)]
pub struct SyncContext {
    pub providers: Arc<ProviderRegistry>,
    pub store: Arc<dyn LibraryStore>,
    pub resolver: Arc<dyn MediaResolver>,
    pub cache: Arc<dyn KeyValueCache>,
    pub runs: Arc<RunRegistry>,
    pub event_bus: EventBus,
    pub clock: Arc<dyn Clock>,
}

impl SyncContext {
    /// Context with a fresh [`RunRegistry`] publishing on `event_bus` and
    /// the system clock.
    pub fn new(
        providers: Arc<ProviderRegistry>,
        store: Arc<dyn LibraryStore>,
        resolver: Arc<dyn MediaResolver>,
        cache: Arc<dyn KeyValueCache>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            providers,
            store,
            resolver,
            cache,
            runs: Arc::new(RunRegistry::new(event_bus.clone())),
            event_bus,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
