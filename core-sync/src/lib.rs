//! # Library Sync Module
//!
//! Reconciles the local media library with the catalogs of registered
//! music providers.
//!
//! ## Overview
//!
//! For every `(provider, media type)` pair the engine compares the
//! identifiers seen in the provider's listing against the identifiers
//! recorded at the end of the previous run, and adds or removes library
//! membership accordingly.
//!
//! ## Components
//!
//! - **Run Registry** (`run_registry`): at most one in-flight run per pair
//! - **Entity Syncer** (`syncer`): the reconciliation algorithm per media type
//! - **Playlist Mutator** (`playlist`): adds/removes playlist tracks with checksum bumps
//! - **Sync Coordinator** (`coordinator`): full syncs, library edits and queries
//! - **Scheduler** (`scheduler`): request queue, periodic timer and registration trigger

pub mod context;
pub mod coordinator;
pub mod error;
pub mod playlist;
pub mod run_registry;
pub mod scheduler;
pub mod syncer;

pub use context::SyncContext;
pub use coordinator::{FullSyncSummary, SyncConfig, SyncCoordinator};
pub use error::{Result, SyncError};
pub use playlist::PlaylistTrackMutator;
pub use run_registry::{RunRegistry, SyncRun};
pub use scheduler::{SchedulerHandle, SyncQueue, SyncRequest, SyncScheduler};
pub use syncer::{memberships_key, prior_ids_key, EntitySyncer, SyncReport, SyncerOptions};
