//! # Event Bus System
//!
//! Typed publish/subscribe on top of `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus carries three families of events:
//! - **Sync**: the set of in-flight sync runs after every change, plus one
//!   completion or failure event per run
//! - **Provider**: provider registration notifications, which trigger a full
//!   sync of the new provider
//! - **Library**: user-visible library mutations (playlist edits, manual
//!   add/remove)
//!
//! ```text
//! ┌──────────────┐   emit    ┌───────────┐  subscribe  ┌──────────────────┐
//! │ RunRegistry  ├──────────>│           ├────────────>│ status display   │
//! └──────────────┘           │ EventBus  │             └──────────────────┘
//! ┌──────────────┐   emit    │ (broadcast│  subscribe  ┌──────────────────┐
//! │ Registration ├──────────>│  channel) ├────────────>│ SyncScheduler    │
//! └──────────────┘           └───────────┘             └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ProviderEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Provider(ProviderEvent::Registered {
//!         provider_id: "filesystem".to_string(),
//!     }))
//!     .ok();
//!
//! let received = stream.recv().await.unwrap();
//! assert!(matches!(received, CoreEvent::Provider(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal;
//!   status subscribers only care about the latest `StatusChanged` anyway.
//! - **`RecvError::Closed`**: every sender was dropped, treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync run status and outcomes
    Sync(SyncEvent),
    /// Provider lifecycle
    Provider(ProviderEvent),
    /// Library mutations
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Provider(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Provider(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// One in-flight sync run, as shown to status observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ActiveRun {
    /// Provider being synced
    pub provider_id: String,
    /// Sync kind (plural media type, e.g. "albums")
    pub kind: String,
}

/// Events related to provider synchronisation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// The set of running syncs changed. Carries the complete current set,
    /// not a delta, so observers can simply replace their view.
    StatusChanged {
        active_runs: Vec<ActiveRun>,
    },
    /// A run finished and its identifier set was persisted.
    Completed {
        provider_id: String,
        kind: String,
        /// Catalog entries consumed from the provider
        items_processed: u64,
        /// Library memberships newly recorded
        items_added: u64,
        /// Library memberships removed because the provider no longer lists them
        items_removed: u64,
        duration_ms: u64,
    },
    /// A run aborted; library membership and the prior identifier set are
    /// unchanged and the next run retries the full delta.
    Failed {
        provider_id: String,
        kind: String,
        message: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::StatusChanged { .. } => "Sync status changed",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }
}

// ============================================================================
// Provider Events
// ============================================================================

/// Provider lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ProviderEvent {
    /// A provider finished registering and is ready to be synced.
    Registered { provider_id: String },
    /// A provider was removed from the registry.
    Unregistered { provider_id: String },
}

impl ProviderEvent {
    fn description(&self) -> &str {
        match self {
            ProviderEvent::Registered { .. } => "Provider registered",
            ProviderEvent::Unregistered { .. } => "Provider unregistered",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to explicit library changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// An item was added to the library on request.
    ItemAdded {
        item_id: String,
        media_type: String,
    },
    /// An item was removed from the library on request.
    ItemRemoved {
        item_id: String,
        media_type: String,
    },
    /// Playlist tracks were added or removed.
    PlaylistUpdated {
        playlist_id: String,
        /// "tracks_added" or "tracks_removed"
        change_type: String,
        /// New checksum stored for the playlist
        checksum: String,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::ItemAdded { .. } => "Item added to library",
            LibraryEvent::ItemRemoved { .. } => "Item removed from library",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every clone publishes into the same
/// channel. Each `subscribe()` creates an independent receiver that sees
/// events published after the call.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if nobody is listening. Publishers in this workspace ignore that
    /// error: an unobserved status change is not a failure.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let sync_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
