//! # Entity Syncer
//!
//! Brings library membership for one `(provider, media type)` pair up to
//! date with the provider's current catalog.
//!
//! ## Workflow
//!
//! 1. Skip silently if the same pair is already syncing
//! 2. Load the identifiers recorded at the end of the previous run
//! 3. Stream the provider's listing; resolve each entry to a library record
//!    and apply the per-type refresh steps
//! 4. Record membership for new ids, then remove it for prior ids the
//!    listing no longer contains
//! 5. Store the current identifiers for the next run
//!
//! Any failure before step 4 aborts the run: membership is untouched and
//! the previous identifier set stays in the cache, so the next run retries
//! the full delta.

use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::run_registry::SyncRun;
use bridge_traits::cache::{get_or_default, put};
use core_library::{MediaItem, MediaType};
use core_runtime::events::{CoreEvent, SyncEvent};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Cache key of the prior identifier set for a provider and media type.
pub fn prior_ids_key(media_type: MediaType, provider_id: &str) -> String {
    format!("library_{}_{}", media_type.plural(), provider_id)
}

/// Cache key of the memberships recorded under a provider other than the
/// syncing one, as `item id -> membership provider`.
pub fn memberships_key(media_type: MediaType, provider_id: &str) -> String {
    format!("{}_members", prior_ids_key(media_type, provider_id))
}

/// Behaviour switches for [`EntitySyncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncerOptions {
    /// Treat an empty listing as authoritative and remove every prior member
    pub purge_on_empty_listing: bool,
    /// Expiry for the stored identifier set
    pub prior_ids_ttl: Option<Duration>,
}

impl Default for SyncerOptions {
    fn default() -> Self {
        Self {
            purge_on_empty_listing: true,
            prior_ids_ttl: None,
        }
    }
}

/// Outcome of one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub provider_id: String,
    pub media_type: Option<MediaType>,
    /// Listing entries consumed
    pub items_processed: u64,
    /// Memberships recorded for ids absent from the prior set
    pub items_added: u64,
    /// Memberships removed for ids missing from the listing
    pub items_removed: u64,
    /// Records refreshed because availability or checksum changed
    pub items_refreshed: u64,
    /// Unavailable album/playlist tracks re-matched or re-added
    pub tracks_healed: u64,
    /// An empty listing was not trusted; nothing was removed or stored
    pub purge_suppressed: bool,
    pub duration_ms: u64,
}

/// The reconciliation algorithm for one media type.
pub struct EntitySyncer {
    media_type: MediaType,
    ctx: SyncContext,
    options: SyncerOptions,
}

impl EntitySyncer {
    pub fn new(media_type: MediaType, ctx: SyncContext, options: SyncerOptions) -> Self {
        Self {
            media_type,
            ctx,
            options,
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Sync this media type for `provider_id`.
    ///
    /// Returns `Ok(None)` when a run for the same pair is already in flight;
    /// the caller gets no error and the running instance's outcome stands.
    #[instrument(skip(self), fields(media_type = %self.media_type))]
    pub async fn sync(&self, provider_id: &str) -> Result<Option<SyncReport>> {
        let run = SyncRun::new(provider_id, self.media_type);
        let started = Instant::now();

        let outcome = self
            .ctx
            .runs
            .guarded(run, || self.reconcile_catalog(provider_id))
            .await;

        match outcome {
            None => Ok(None),
            Some(Ok(mut report)) => {
                report.duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    provider_id,
                    processed = report.items_processed,
                    added = report.items_added,
                    removed = report.items_removed,
                    refreshed = report.items_refreshed,
                    healed = report.tracks_healed,
                    duration_ms = report.duration_ms,
                    "Sync completed"
                );
                self.ctx
                    .event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Completed {
                        provider_id: provider_id.to_string(),
                        kind: self.media_type.plural().to_string(),
                        items_processed: report.items_processed,
                        items_added: report.items_added,
                        items_removed: report.items_removed,
                        duration_ms: report.duration_ms,
                    }))
                    .ok();
                Ok(Some(report))
            }
            Some(Err(e)) => {
                warn!(provider_id, error = %e, "Sync aborted, library left unchanged");
                self.ctx
                    .event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        provider_id: provider_id.to_string(),
                        kind: self.media_type.plural().to_string(),
                        message: e.to_string(),
                    }))
                    .ok();
                Err(e)
            }
        }
    }

    async fn reconcile_catalog(&self, provider_id: &str) -> Result<SyncReport> {
        let provider = self
            .ctx
            .providers
            .get(provider_id)
            .ok_or_else(|| SyncError::ProviderNotFound(provider_id.to_string()))?;

        let key = prior_ids_key(self.media_type, provider_id);
        let prior: Vec<String> = get_or_default(self.ctx.cache.as_ref(), &key, Vec::new())
            .await
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        let prior_set: HashSet<&str> = prior.iter().map(String::as_str).collect();
        let members_key = memberships_key(self.media_type, provider_id);
        let prior_members: HashMap<String, String> =
            get_or_default(self.ctx.cache.as_ref(), &members_key, HashMap::new())
                .await
                .map_err(|e| SyncError::Cache(e.to_string()))?;

        let mut report = SyncReport {
            provider_id: provider_id.to_string(),
            media_type: Some(self.media_type),
            ..SyncReport::default()
        };

        let mut current: Vec<String> = Vec::new();
        let mut current_set: HashSet<String> = HashSet::new();
        let mut pending: Vec<(String, String)> = Vec::new();
        let mut members: HashMap<String, String> = HashMap::new();

        let mut listing = provider.list_library(self.media_type).await?;
        while let Some(entry) = listing.next().await {
            let item = entry?;
            report.items_processed += 1;

            let record = self.reconcile_item(provider_id, &item, &mut report).await?;
            if !current_set.insert(record.item_id.clone()) {
                debug!(item_id = %record.item_id, "Listing resolved to an already seen record");
                continue;
            }

            let member_of = self.membership_provider(provider_id, &item);
            if member_of != provider_id {
                members.insert(record.item_id.clone(), member_of.to_string());
            }
            if !prior_set.contains(record.item_id.as_str()) {
                pending.push((record.item_id.clone(), member_of.to_string()));
            }
            current.push(record.item_id);
        }

        if current.is_empty() && !prior.is_empty() && !self.options.purge_on_empty_listing {
            warn!(
                provider_id,
                prior = prior.len(),
                "Empty listing with a non-empty prior set, keeping library membership"
            );
            report.purge_suppressed = true;
            return Ok(report);
        }

        // membership changes only once the full listing is known
        self.apply_additions(&pending).await?;
        report.items_added = pending.len() as u64;

        for stale_id in prior.iter().filter(|id| !current_set.contains(*id)) {
            let member_of = prior_members
                .get(stale_id)
                .map(String::as_str)
                .unwrap_or(provider_id);
            self.ctx
                .store
                .remove_from_library(stale_id, self.media_type, member_of)
                .await?;
            report.items_removed += 1;
        }

        if !members.is_empty() || !prior_members.is_empty() {
            put(self.ctx.cache.as_ref(), &members_key, &members, self.options.prior_ids_ttl)
                .await
                .map_err(|e| SyncError::Cache(e.to_string()))?;
        }
        put(self.ctx.cache.as_ref(), &key, &current, self.options.prior_ids_ttl)
            .await
            .map_err(|e| SyncError::Cache(e.to_string()))?;

        Ok(report)
    }

    /// Record new memberships, undoing the ones already written if any fails.
    async fn apply_additions(&self, pending: &[(String, String)]) -> Result<()> {
        for (applied, (item_id, member_of)) in pending.iter().enumerate() {
            if let Err(e) = self
                .ctx
                .store
                .add_to_library(item_id, self.media_type, member_of)
                .await
            {
                for (undo_id, undo_of) in &pending[..applied] {
                    if let Err(undo) = self
                        .ctx
                        .store
                        .remove_from_library(undo_id, self.media_type, undo_of)
                        .await
                    {
                        warn!(item_id = %undo_id, error = %undo, "Could not undo library membership");
                    }
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Playlists are members under the provider that serves them.
    fn membership_provider<'a>(&self, provider_id: &'a str, item: &'a MediaItem) -> &'a str {
        match self.media_type {
            MediaType::Playlist => item.source_provider().unwrap_or(provider_id),
            _ => provider_id,
        }
    }

    async fn reconcile_item(
        &self,
        provider_id: &str,
        item: &MediaItem,
        report: &mut SyncReport,
    ) -> Result<MediaItem> {
        let resolver = &self.ctx.resolver;
        let mut record = resolver.resolve(provider_id, item).await?;

        match self.media_type {
            MediaType::Album => {
                if record.available != item.available {
                    record = resolver.match_item(&record).await?;
                    report.items_refreshed += 1;
                }
                let tracks = resolver.album_tracks(provider_id, &item.item_id).await?;
                self.heal_tracks(provider_id, tracks, report).await?;
            }
            MediaType::Track => {
                if record.available != item.available {
                    record = resolver.add_item(provider_id, item).await?;
                    report.items_refreshed += 1;
                }
            }
            MediaType::Playlist => {
                if record.checksum != item.checksum {
                    record = resolver.add_playlist(provider_id, item).await?;
                    report.items_refreshed += 1;
                }
                // track availability changes independently of the checksum
                let tracks = resolver.playlist_tracks(provider_id, &item.item_id).await?;
                self.heal_tracks(provider_id, tracks, report).await?;
            }
            MediaType::Artist | MediaType::Radio => {}
        }

        Ok(record)
    }

    async fn heal_tracks(
        &self,
        provider_id: &str,
        tracks: Vec<MediaItem>,
        report: &mut SyncReport,
    ) -> Result<()> {
        for track in tracks.iter().filter(|t| !t.available) {
            if track.origin.is_library() {
                self.ctx.resolver.match_item(track).await?;
            } else {
                let source = track.source_provider().unwrap_or(provider_id);
                self.ctx.resolver.add_item(source, track).await?;
            }
            report.tracks_healed += 1;
        }
        Ok(())
    }
}
