//! Playlist track mutation
//!
//! Adds or removes tracks on an editable library playlist through the
//! provider that owns it. Every successful mutation stamps a new checksum
//! on the library record before the provider is called, so the next
//! playlist sync sees a mismatch and refreshes from the provider.

use crate::context::SyncContext;
use crate::error::Result;
use core_library::{MediaItem, MediaType, MusicProvider, PlaylistField, ProviderKind, ProviderRef};
use core_runtime::events::{CoreEvent, LibraryEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A playlist that accepts mutations, with the provider that owns it.
struct EditablePlaylist {
    playlist: MediaItem,
    target: ProviderRef,
    provider: Arc<dyn MusicProvider>,
}

pub struct PlaylistTrackMutator {
    ctx: SyncContext,
}

impl PlaylistTrackMutator {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Append `tracks` to the library playlist `playlist_id`.
    ///
    /// Tracks already on the playlist, under their library id or any of
    /// their provider ids, are skipped. Returns `Ok(false)` when the playlist
    /// is missing or not editable, or when nothing is left to add.
    #[instrument(skip(self, tracks), fields(count = tracks.len()))]
    pub async fn add_tracks(&self, playlist_id: &str, tracks: &[MediaItem]) -> Result<bool> {
        let Some(target) = self.editable_playlist(playlist_id).await? else {
            return Ok(false);
        };

        let existing = self
            .ctx
            .resolver
            .playlist_tracks(&target.target.provider, &target.target.item_id)
            .await?;
        let mut present: HashSet<String> = existing
            .iter()
            .flat_map(|t| t.known_ids().map(str::to_string))
            .collect();

        let mut entries = Vec::new();
        for track in tracks {
            if track.known_ids().any(|id| present.contains(id)) {
                debug!(track_id = %track.item_id, "Track already on playlist");
                continue;
            }
            match Self::playlist_entry(&target, track) {
                Some(entry) => {
                    present.extend(track.known_ids().map(str::to_string));
                    entries.push(entry);
                }
                None => debug!(
                    track_id = %track.item_id,
                    provider = %target.target.provider,
                    "Track has no version usable on the playlist provider"
                ),
            }
        }

        if entries.is_empty() {
            return Ok(false);
        }

        let checksum = self.bump_checksum(&target.playlist).await?;
        let accepted = target
            .provider
            .add_playlist_tracks(&target.target.item_id, &entries)
            .await?;

        info!(added = entries.len(), accepted, "Tracks added to playlist");
        self.announce(&target.playlist, "tracks_added", checksum);
        Ok(accepted)
    }

    /// Remove `tracks` from the library playlist `playlist_id`.
    ///
    /// Every reference a track has on the playlist's provider is removed.
    /// URI-passthrough playlists additionally drop the `provider://id` form
    /// of the track's other references. Returns `Ok(false)` with the
    /// checksum untouched when no identifier could be collected.
    #[instrument(skip(self, tracks), fields(count = tracks.len()))]
    pub async fn remove_tracks(&self, playlist_id: &str, tracks: &[MediaItem]) -> Result<bool> {
        let Some(target) = self.editable_playlist(playlist_id).await? else {
            return Ok(false);
        };
        let passthrough = target.provider.kind() == ProviderKind::UriPassthrough;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for provider_ref in tracks.iter().flat_map(|t| t.provider_refs.iter()) {
            let entry = if provider_ref.provider == target.target.provider {
                provider_ref.item_id.clone()
            } else if passthrough {
                provider_ref.uri()
            } else {
                continue;
            };
            if seen.insert(entry.clone()) {
                entries.push(entry);
            }
        }

        if entries.is_empty() {
            debug!("No track identifiers for the playlist provider");
            return Ok(false);
        }

        let checksum = self.bump_checksum(&target.playlist).await?;
        let accepted = target
            .provider
            .remove_playlist_tracks(&target.target.item_id, &entries)
            .await?;

        info!(removed = entries.len(), accepted, "Tracks removed from playlist");
        self.announce(&target.playlist, "tracks_removed", checksum);
        Ok(accepted)
    }

    async fn editable_playlist(&self, playlist_id: &str) -> Result<Option<EditablePlaylist>> {
        let Some(playlist) = self
            .ctx
            .store
            .get_item(MediaType::Playlist, playlist_id)
            .await?
        else {
            debug!(playlist_id, "Playlist not in library");
            return Ok(None);
        };

        if !playlist.is_editable {
            debug!(playlist_id, "Playlist is read-only");
            return Ok(None);
        }

        let Some(target) = playlist.provider_refs.first().cloned() else {
            warn!(playlist_id, "Editable playlist without a provider reference");
            return Ok(None);
        };

        let Some(provider) = self.ctx.providers.get(&target.provider) else {
            warn!(playlist_id, provider = %target.provider, "Playlist provider not registered");
            return Ok(None);
        };

        Ok(Some(EditablePlaylist {
            playlist,
            target,
            provider,
        }))
    }

    /// How `track` is written onto the target playlist, if at all.
    fn playlist_entry(target: &EditablePlaylist, track: &MediaItem) -> Option<String> {
        if let Some(native) = track.refs_for(&target.target.provider).first() {
            return Some(native.item_id.clone());
        }
        if target.provider.kind() == ProviderKind::UriPassthrough {
            return track.best_ref().map(ProviderRef::uri);
        }
        None
    }

    async fn bump_checksum(&self, playlist: &MediaItem) -> Result<String> {
        let checksum = self.ctx.clock.unix_timestamp_millis().to_string();
        self.ctx
            .store
            .update_playlist(&playlist.item_id, PlaylistField::Checksum(checksum.clone()))
            .await?;
        Ok(checksum)
    }

    fn announce(&self, playlist: &MediaItem, change_type: &str, checksum: String) {
        self.ctx
            .event_bus
            .emit(CoreEvent::Library(LibraryEvent::PlaylistUpdated {
                playlist_id: playlist.item_id.clone(),
                change_type: change_type.to_string(),
                checksum,
            }))
            .ok();
    }
}
