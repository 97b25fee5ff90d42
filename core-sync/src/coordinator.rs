//! # Sync Coordinator
//!
//! Entry point for library synchronisation and library edits.
//!
//! ## Overview
//!
//! The `SyncCoordinator` owns one [`EntitySyncer`] per media type and the
//! [`PlaylistTrackMutator`], and exposes the operations higher layers call:
//! - Register providers and react to registration with a background full sync
//! - Run a full sync for one provider, or for every catalog provider
//! - Queue sync requests for the scheduler worker
//! - Add or remove arbitrary items to/from the library
//! - Query library members per media type
//! - Add or remove playlist tracks
//!
//! ## Full Sync
//!
//! A full sync walks the provider's supported media types in the fixed order
//! artists, albums, tracks, playlists, radios. A failing media type is logged
//! and recorded in the [`FullSyncSummary`]; the remaining types still run.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (queue, requests) = SyncQueue::bounded(64);
//! let coordinator = Arc::new(SyncCoordinator::new(ctx, SyncConfig::default(), queue));
//!
//! coordinator.register_provider(provider);
//! let summary = coordinator.full_sync("spotify").await?;
//! println!("{} media types synced", summary.reports.len());
//! ```

use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::playlist::PlaylistTrackMutator;
use crate::run_registry::SyncRun;
use crate::scheduler::{SyncQueue, SyncRequest};
use crate::syncer::{EntitySyncer, SyncReport, SyncerOptions};
use core_library::{MediaItem, MediaType, MusicProvider, OrderBy, LIBRARY_PROVIDER_ID};
use core_runtime::config::{
    CoreConfig, DEFAULT_INITIAL_SYNC_DELAY, DEFAULT_SYNC_INTERVAL, DEFAULT_SYNC_QUEUE_CAPACITY,
};
use core_runtime::events::{CoreEvent, LibraryEvent, ProviderEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Sync coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Time between periodic full syncs of every catalog provider
    pub sync_interval: Duration,

    /// Delay before the first periodic sync, so providers can register
    pub initial_sync_delay: Duration,

    /// Whether the scheduler runs the periodic timer
    pub enable_periodic_sync: bool,

    /// Whether a provider registration queues a full sync for it
    pub sync_on_provider_registered: bool,

    /// Whether an empty catalog listing removes every prior member
    pub purge_on_empty_listing: bool,

    /// Expiry for stored prior identifier sets
    pub prior_ids_ttl: Option<Duration>,

    /// Capacity of the sync request queue
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            initial_sync_delay: DEFAULT_INITIAL_SYNC_DELAY,
            enable_periodic_sync: true,
            sync_on_provider_registered: true,
            purge_on_empty_listing: true,
            prior_ids_ttl: None,
            queue_capacity: DEFAULT_SYNC_QUEUE_CAPACITY,
        }
    }
}

impl From<&CoreConfig> for SyncConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            sync_interval: config.sync_interval,
            initial_sync_delay: config.initial_sync_delay,
            enable_periodic_sync: config.features.enable_periodic_sync,
            sync_on_provider_registered: config.features.sync_on_provider_registered,
            purge_on_empty_listing: config.features.purge_on_empty_listing,
            prior_ids_ttl: config.prior_ids_ttl,
            queue_capacity: config.sync_queue_capacity,
        }
    }
}

impl SyncConfig {
    fn syncer_options(&self) -> SyncerOptions {
        SyncerOptions {
            purge_on_empty_listing: self.purge_on_empty_listing,
            prior_ids_ttl: self.prior_ids_ttl,
        }
    }
}

/// Per-media-type outcome of a full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSyncSummary {
    pub provider_id: String,
    /// Completed runs, in sync order
    pub reports: Vec<SyncReport>,
    /// Media types skipped because a run was already in flight
    pub skipped: Vec<MediaType>,
    /// Media types whose run failed, with the error message
    pub failures: Vec<(MediaType, String)>,
}

impl FullSyncSummary {
    fn new(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SyncCoordinator {
    ctx: SyncContext,
    config: SyncConfig,
    /// One syncer per media type, in full-sync order
    syncers: Vec<EntitySyncer>,
    playlists: PlaylistTrackMutator,
    queue: SyncQueue,
}

impl SyncCoordinator {
    pub fn new(ctx: SyncContext, config: SyncConfig, queue: SyncQueue) -> Self {
        let options = config.syncer_options();
        let syncers = MediaType::ALL
            .iter()
            .map(|media_type| EntitySyncer::new(*media_type, ctx.clone(), options))
            .collect();

        Self {
            playlists: PlaylistTrackMutator::new(ctx.clone()),
            ctx,
            config,
            syncers,
            queue,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs currently in flight.
    pub fn active_runs(&self) -> Vec<SyncRun> {
        self.ctx.runs.active()
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Register a provider and announce it with [`ProviderEvent::Registered`].
    ///
    /// The scheduler reacts to the event by calling
    /// [`on_provider_registered`](Self::on_provider_registered).
    pub fn register_provider(&self, provider: Arc<dyn MusicProvider>) {
        let provider_id = provider.id().to_string();
        if self.ctx.providers.register(provider).is_some() {
            debug!(provider_id = %provider_id, "Replaced previously registered provider");
        }
        self.ctx
            .event_bus
            .emit(CoreEvent::Provider(ProviderEvent::Registered { provider_id }))
            .ok();
    }

    pub fn unregister_provider(&self, provider_id: &str) -> bool {
        let removed = self.ctx.providers.unregister(provider_id).is_some();
        if removed {
            info!(provider_id, "Provider unregistered");
            self.ctx
                .event_bus
                .emit(CoreEvent::Provider(ProviderEvent::Unregistered {
                    provider_id: provider_id.to_string(),
                }))
                .ok();
        }
        removed
    }

    /// Queue a full sync for a freshly registered catalog provider.
    ///
    /// Returns whether a sync was queued. Fire-and-forget: the outcome of the
    /// sync itself is never observed here.
    pub fn on_provider_registered(&self, provider_id: &str) -> Result<bool> {
        if !self.config.sync_on_provider_registered {
            return Ok(false);
        }

        let Some(provider) = self.ctx.providers.get(provider_id) else {
            debug!(provider_id, "Registered provider vanished before sync");
            return Ok(false);
        };

        if !provider.is_catalog() {
            debug!(provider_id, kind = ?provider.kind(), "Not a catalog provider, no sync");
            return Ok(false);
        }

        self.queue
            .request(SyncRequest::Provider(provider_id.to_string()))?;
        Ok(true)
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Sync every media type the provider supports, in full-sync order.
    #[instrument(skip(self))]
    pub async fn full_sync(&self, provider_id: &str) -> Result<FullSyncSummary> {
        let provider = self
            .ctx
            .providers
            .get(provider_id)
            .ok_or_else(|| SyncError::ProviderNotFound(provider_id.to_string()))?;
        let supported = provider.supported_media_types();

        info!(media_types = ?supported, "Starting full sync");

        let mut summary = FullSyncSummary::new(provider_id);
        for syncer in self
            .syncers
            .iter()
            .filter(|s| supported.contains(&s.media_type()))
        {
            match syncer.sync(provider_id).await {
                Ok(Some(report)) => summary.reports.push(report),
                Ok(None) => summary.skipped.push(syncer.media_type()),
                Err(e) => {
                    error!(media_type = %syncer.media_type(), error = %e, "Media type sync failed");
                    summary.failures.push((syncer.media_type(), e.to_string()));
                }
            }
        }

        info!(
            completed = summary.reports.len(),
            skipped = summary.skipped.len(),
            failed = summary.failures.len(),
            "Full sync finished"
        );
        Ok(summary)
    }

    /// Full sync of every catalog provider, one provider at a time.
    pub async fn sync_all(&self) -> Vec<FullSyncSummary> {
        let providers = self.ctx.providers.catalog_providers();
        info!(providers = providers.len(), "Syncing all catalog providers");

        let mut summaries = Vec::with_capacity(providers.len());
        for provider in providers {
            match self.full_sync(provider.id()).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!(provider_id = %provider.id(), error = %e, "Provider sync failed"),
            }
        }
        summaries
    }

    /// Sync a single media type for a provider.
    pub async fn sync_media_type(
        &self,
        provider_id: &str,
        media_type: MediaType,
    ) -> Result<Option<SyncReport>> {
        self.syncer(media_type).sync(provider_id).await
    }

    pub fn syncer(&self, media_type: MediaType) -> &EntitySyncer {
        // ALL order and syncers order match
        let index = MediaType::ALL
            .iter()
            .position(|m| *m == media_type)
            .unwrap_or_default();
        &self.syncers[index]
    }

    /// Queue a full sync of one provider.
    pub fn trigger_provider_sync(&self, provider_id: &str) -> Result<()> {
        if self.ctx.providers.get(provider_id).is_none() {
            return Err(SyncError::ProviderNotFound(provider_id.to_string()));
        }
        self.queue
            .request(SyncRequest::Provider(provider_id.to_string()))
    }

    /// Queue a full sync of every catalog provider.
    pub fn trigger_full_sync(&self) -> Result<()> {
        self.queue.request(SyncRequest::All)
    }

    // =========================================================================
    // Library
    // =========================================================================

    pub async fn library_items(
        &self,
        media_type: MediaType,
        order_by: OrderBy,
    ) -> Result<Vec<MediaItem>> {
        Ok(self.ctx.store.list_library(media_type, order_by).await?)
    }

    pub async fn library_playlist_by_name(&self, name: &str) -> Result<Option<MediaItem>> {
        Ok(self
            .ctx
            .store
            .find_library_item_by_name(MediaType::Playlist, name)
            .await?)
    }

    pub async fn library_radio_by_name(&self, name: &str) -> Result<Option<MediaItem>> {
        Ok(self
            .ctx
            .store
            .find_library_item_by_name(MediaType::Radio, name)
            .await?)
    }

    /// Add an item to the library on every registered provider it references.
    ///
    /// A library-owned record is also marked as a member under the library's
    /// own provider id. Returns the last provider's answer, `false` when no
    /// referenced provider is registered.
    #[instrument(skip(self, item), fields(item_id = %item.item_id, media_type = %item.media_type))]
    pub async fn library_add(&self, item: &MediaItem) -> Result<bool> {
        let mut result = false;
        for provider_ref in &item.provider_refs {
            let Some(provider) = self.ctx.providers.get(&provider_ref.provider) else {
                continue;
            };
            result = provider
                .library_add(&provider_ref.item_id, item.media_type)
                .await?;
        }

        if item.origin.is_library() {
            self.ctx
                .store
                .add_to_library(&item.item_id, item.media_type, LIBRARY_PROVIDER_ID)
                .await?;
        }

        self.ctx
            .event_bus
            .emit(CoreEvent::Library(LibraryEvent::ItemAdded {
                item_id: item.item_id.clone(),
                media_type: item.media_type.to_string(),
            }))
            .ok();
        Ok(result)
    }

    /// Counterpart of [`library_add`](Self::library_add).
    #[instrument(skip(self, item), fields(item_id = %item.item_id, media_type = %item.media_type))]
    pub async fn library_remove(&self, item: &MediaItem) -> Result<bool> {
        let mut result = false;
        for provider_ref in &item.provider_refs {
            let Some(provider) = self.ctx.providers.get(&provider_ref.provider) else {
                continue;
            };
            result = provider
                .library_remove(&provider_ref.item_id, item.media_type)
                .await?;
        }

        if item.origin.is_library() {
            self.ctx
                .store
                .remove_from_library(&item.item_id, item.media_type, LIBRARY_PROVIDER_ID)
                .await?;
        }

        self.ctx
            .event_bus
            .emit(CoreEvent::Library(LibraryEvent::ItemRemoved {
                item_id: item.item_id.clone(),
                media_type: item.media_type.to_string(),
            }))
            .ok();
        Ok(result)
    }

    pub async fn add_playlist_tracks(&self, playlist_id: &str, tracks: &[MediaItem]) -> Result<bool> {
        self.playlists.add_tracks(playlist_id, tracks).await
    }

    pub async fn remove_playlist_tracks(
        &self,
        playlist_id: &str,
        tracks: &[MediaItem],
    ) -> Result<bool> {
        self.playlists.remove_tracks(playlist_id, tracks).await
    }
}
