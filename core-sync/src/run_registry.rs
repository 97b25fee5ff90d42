//! # Run Registry
//!
//! Tracks which `(provider, sync kind)` pairs are executing and guarantees
//! that at most one run per pair is in flight.
//!
//! `begin` checks and registers under one mutex acquisition, with no
//! suspension point in between, so two concurrent callers can never both
//! see the key as free. Every change publishes the full set of active runs
//! as [`SyncEvent::StatusChanged`].
//!
//! ```rust,ignore
//! let registry = RunRegistry::new(event_bus);
//! let run = SyncRun::new("spotify", MediaType::Album);
//!
//! // None when another albums run for spotify is already in flight
//! let outcome = registry.guarded(run, || sync_albums("spotify")).await;
//! ```

use core_library::MediaType;
use core_runtime::events::{ActiveRun, CoreEvent, EventBus, SyncEvent};
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use tracing::debug;

/// One in-flight sync: a provider and the media type being synced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncRun {
    pub provider_id: String,
    pub kind: MediaType,
}

impl SyncRun {
    pub fn new(provider_id: impl Into<String>, kind: MediaType) -> Self {
        Self {
            provider_id: provider_id.into(),
            kind,
        }
    }
}

impl fmt::Display for SyncRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider_id, self.kind.plural())
    }
}

impl From<&SyncRun> for ActiveRun {
    fn from(run: &SyncRun) -> Self {
        ActiveRun {
            provider_id: run.provider_id.clone(),
            kind: run.kind.plural().to_string(),
        }
    }
}

pub struct RunRegistry {
    active: Mutex<Vec<SyncRun>>,
    event_bus: Option<EventBus>,
}

impl RunRegistry {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            active: Mutex::new(Vec::new()),
            event_bus: Some(event_bus),
        }
    }

    /// A registry that publishes nothing.
    pub fn detached() -> Self {
        Self {
            active: Mutex::new(Vec::new()),
            event_bus: None,
        }
    }

    /// Register `run` unless an identical run is active.
    ///
    /// Returns `false`, changing nothing, when the run is already registered.
    pub fn begin(&self, run: &SyncRun) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.contains(run) {
            return false;
        }
        active.push(run.clone());
        self.publish(&active);
        true
    }

    /// Remove the registration for `run`, if any.
    pub fn end(&self, run: &SyncRun) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let before = active.len();
        active.retain(|r| r != run);
        if active.len() != before {
            self.publish(&active);
        }
    }

    /// Snapshot of the runs in flight, in start order.
    pub fn active(&self) -> Vec<SyncRun> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_running(&self, run: &SyncRun) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(run)
    }

    /// Run `f` bracketed by `begin`/`end`.
    ///
    /// Returns `None` without calling `f` if the run is already active. The
    /// registration is released when the returned future completes, including
    /// when `f` fails, and when the future is dropped before completion.
    pub async fn guarded<F, Fut, T>(&self, run: SyncRun, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.begin(&run) {
            debug!(run = %run, "Sync already running, skipping");
            return None;
        }

        let _guard = RunGuard {
            registry: self,
            run,
        };
        Some(f().await)
    }

    // called with the lock held so observers see snapshots in change order
    fn publish(&self, active: &[SyncRun]) {
        if let Some(event_bus) = &self.event_bus {
            event_bus
                .emit(CoreEvent::Sync(SyncEvent::StatusChanged {
                    active_runs: active.iter().map(ActiveRun::from).collect(),
                }))
                .ok();
        }
    }
}

impl fmt::Debug for RunRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRegistry")
            .field("active", &self.active())
            .finish()
    }
}

struct RunGuard<'a> {
    registry: &'a RunRegistry,
    run: SyncRun,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.registry.end(&self.run);
    }
}
