//! Match/lookup between provider-native items and library records
//!
//! [`LibraryResolver`] matches strictly on provider references: a provider
//! item belongs to the record that owns `(media type, provider, item id)`.
//! It never compares names or metadata.

use crate::error::{LibraryError, Result};
use crate::models::{MediaItem, MediaType, ProviderRef};
use crate::provider::{MusicProvider, ProviderRegistry};
use crate::store::LibraryStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// The library record for a provider item, created on first sight.
    async fn resolve(&self, provider_id: &str, item: &MediaItem) -> Result<MediaItem>;

    /// Re-check a library record against every registered provider it
    /// references and store the resulting availability.
    async fn match_item(&self, item: &MediaItem) -> Result<MediaItem>;

    /// Insert or refresh the library record for `item` from a provider's view.
    async fn add_item(&self, provider_id: &str, item: &MediaItem) -> Result<MediaItem>;

    /// Like [`add_item`](Self::add_item), additionally taking over the
    /// playlist's checksum, editability and owner.
    async fn add_playlist(&self, provider_id: &str, playlist: &MediaItem) -> Result<MediaItem>;

    /// Tracks of a provider album; tracks already known to the library are
    /// returned as their library record.
    async fn album_tracks(&self, provider_id: &str, album_id: &str) -> Result<Vec<MediaItem>>;

    /// Tracks of a provider playlist, resolved like [`album_tracks`](Self::album_tracks).
    async fn playlist_tracks(&self, provider_id: &str, playlist_id: &str)
        -> Result<Vec<MediaItem>>;
}

/// Store-backed [`MediaResolver`]
pub struct LibraryResolver {
    store: Arc<dyn LibraryStore>,
    providers: Arc<ProviderRegistry>,
}

impl LibraryResolver {
    pub fn new(store: Arc<dyn LibraryStore>, providers: Arc<ProviderRegistry>) -> Self {
        Self { store, providers }
    }

    fn provider(&self, provider_id: &str) -> Result<Arc<dyn MusicProvider>> {
        self.providers
            .get(provider_id)
            .ok_or_else(|| LibraryError::NotFound {
                entity_type: "provider".to_string(),
                id: provider_id.to_string(),
            })
    }

    /// Refs of `item` plus the handle the provider itself uses for it.
    fn refs_with_source(provider_id: &str, item: &MediaItem) -> Vec<ProviderRef> {
        let mut refs = item.provider_refs.clone();
        if item.source_provider().is_some()
            && !refs
                .iter()
                .any(|r| r.provider == provider_id && r.item_id == item.item_id)
        {
            refs.push(ProviderRef::new(provider_id, item.item_id.clone(), 0));
        }
        refs
    }

    async fn find_existing(&self, media_type: MediaType, refs: &[ProviderRef]) -> Result<Option<MediaItem>> {
        for provider_ref in refs {
            if let Some(found) = self
                .store
                .find_by_provider_ref(media_type, &provider_ref.provider, &provider_ref.item_id)
                .await?
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    async fn upsert(
        &self,
        provider_id: &str,
        item: &MediaItem,
        apply: impl Fn(&mut MediaItem, &MediaItem) + Send,
    ) -> Result<MediaItem> {
        if item.origin.is_library() {
            let mut record = match self.store.get_item(item.media_type, &item.item_id).await? {
                Some(record) => record,
                None => {
                    return Err(LibraryError::NotFound {
                        entity_type: item.media_type.to_string(),
                        id: item.item_id.clone(),
                    })
                }
            };
            apply(&mut record, item);
            record.merge_refs(&item.provider_refs);
            self.store.update_item(&record).await?;
            return Ok(record);
        }

        let refs = Self::refs_with_source(provider_id, item);
        match self.find_existing(item.media_type, &refs).await? {
            Some(mut record) => {
                apply(&mut record, item);
                record.merge_refs(&refs);
                self.store.update_item(&record).await?;
                Ok(record)
            }
            None => {
                let mut record = MediaItem::library_copy(item);
                record.provider_refs = refs;
                self.store.insert_item(&record).await?;
                debug!(
                    provider_id,
                    item_id = %record.item_id,
                    media_type = %record.media_type,
                    "Created library record"
                );
                Ok(record)
            }
        }
    }

    async fn resolve_tracks(&self, provider_id: &str, tracks: Vec<MediaItem>) -> Result<Vec<MediaItem>> {
        let mut resolved = Vec::with_capacity(tracks.len());
        for track in tracks {
            // `provider://id` entries on passthrough playlists carry their own provider
            let source = track.source_provider().unwrap_or(provider_id);
            let known = self
                .store
                .find_by_provider_ref(MediaType::Track, source, &track.item_id)
                .await?;
            resolved.push(known.unwrap_or(track));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl MediaResolver for LibraryResolver {
    async fn resolve(&self, provider_id: &str, item: &MediaItem) -> Result<MediaItem> {
        if let Some(record) = self
            .store
            .find_by_provider_ref(item.media_type, provider_id, &item.item_id)
            .await?
        {
            return Ok(record);
        }

        // another version of the same item may already own one of the refs
        let refs = Self::refs_with_source(provider_id, item);
        if let Some(record) = self.find_existing(item.media_type, &refs).await? {
            return Ok(record);
        }

        let mut record = MediaItem::library_copy(item);
        record.provider_refs = refs;
        self.store.insert_item(&record).await?;
        Ok(record)
    }

    #[instrument(skip(self, item), fields(item_id = %item.item_id, media_type = %item.media_type))]
    async fn match_item(&self, item: &MediaItem) -> Result<MediaItem> {
        let mut record = if item.origin.is_library() {
            item.clone()
        } else {
            let provider_id = item.source_provider().unwrap_or_default().to_string();
            self.resolve(&provider_id, item).await?
        };

        let mut checked_any = false;
        let mut available = false;
        for provider_ref in &record.provider_refs {
            let Some(provider) = self.providers.get(&provider_ref.provider) else {
                continue;
            };
            checked_any = true;
            if let Some(found) = provider
                .get_item(record.media_type, &provider_ref.item_id)
                .await?
            {
                available |= found.available;
            }
        }

        if checked_any && available != record.available {
            debug!(available, "Availability changed after re-match");
            record.available = available;
            self.store.update_item(&record).await?;
        }

        Ok(record)
    }

    async fn add_item(&self, provider_id: &str, item: &MediaItem) -> Result<MediaItem> {
        self.upsert(provider_id, item, |record, source| {
            record.available = source.available;
            if record.artist.is_none() {
                record.artist = source.artist.clone();
            }
            if record.album.is_none() {
                record.album = source.album.clone();
            }
        })
        .await
    }

    async fn add_playlist(&self, provider_id: &str, playlist: &MediaItem) -> Result<MediaItem> {
        self.upsert(provider_id, playlist, |record, source| {
            record.name = source.name.clone();
            record.available = source.available;
            record.is_editable = source.is_editable;
            record.checksum = source.checksum.clone();
            record.owner = source.owner.clone();
        })
        .await
    }

    async fn album_tracks(&self, provider_id: &str, album_id: &str) -> Result<Vec<MediaItem>> {
        let tracks = self.provider(provider_id)?.album_tracks(album_id).await?;
        self.resolve_tracks(provider_id, tracks).await
    }

    async fn playlist_tracks(&self, provider_id: &str, playlist_id: &str) -> Result<Vec<MediaItem>> {
        let tracks = self.provider(provider_id)?.playlist_tracks(playlist_id).await?;
        self.resolve_tracks(provider_id, tracks).await
    }
}
