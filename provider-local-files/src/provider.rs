//! Local music folder exposed as a [`MusicProvider`]
//!
//! - Tracks are the audio files below the music folder; the item id is the
//!   path relative to the folder
//! - Albums and artists are derived from the tracks' tags
//! - Playlists are `.m3u`/`.m3u8` files in the playlists folder, always
//!   editable, with the file modification time as checksum
//!
//! Playlists accept entries from any provider as `provider://item_id`, so
//! the provider kind is [`ProviderKind::UriPassthrough`].

use crate::error::{LocalFilesError, Result};
use crate::m3u::{self, Entry};
use crate::scanner::{self, ScannedTrack};
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use core_library::{listing_from_vec, CatalogListing, MediaItem, MediaType, MusicProvider, ProviderKind};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, instrument};

/// Provider id used when none is configured.
pub const DEFAULT_PROVIDER_ID: &str = "filesystem";

const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8"];

#[derive(Debug, Clone)]
pub struct LocalFilesConfig {
    pub provider_id: String,
    pub name: String,
    pub music_dir: PathBuf,
    /// Defaults to `<music_dir>/playlists`
    pub playlists_dir: PathBuf,
}

impl LocalFilesConfig {
    pub fn new(music_dir: impl Into<PathBuf>) -> Self {
        let music_dir = music_dir.into();
        Self {
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            name: "Local Files".to_string(),
            playlists_dir: music_dir.join("playlists"),
            music_dir,
        }
    }

    pub fn provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = id.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn playlists_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.playlists_dir = dir.into();
        self
    }
}

pub struct LocalFilesProvider {
    config: LocalFilesConfig,
}

impl LocalFilesProvider {
    pub fn new(config: LocalFilesConfig) -> Self {
        info!(
            provider_id = %config.provider_id,
            music_dir = %config.music_dir.display(),
            "Local files provider configured"
        );
        Self { config }
    }

    pub fn config(&self) -> &LocalFilesConfig {
        &self.config
    }

    async fn scan(&self) -> Result<Vec<ScannedTrack>> {
        let root = self.config.music_dir.clone();
        let skip = self.config.playlists_dir.clone();
        tokio::task::spawn_blocking(move || scanner::scan_folder(&root, Some(&skip)))
            .await
            .map_err(|e| LocalFilesError::Task(e.to_string()))?
    }

    fn track_item(&self, track: &ScannedTrack) -> MediaItem {
        let mut item = MediaItem::from_provider(
            &self.config.provider_id,
            MediaType::Track,
            &track.id,
            &track.title,
        );
        item.artist = track.artist.clone();
        item.album = track.album.clone();
        item
    }

    fn album_items(&self, tracks: &[ScannedTrack]) -> Vec<MediaItem> {
        let mut seen = HashSet::new();
        tracks
            .iter()
            .filter_map(|track| {
                let key = track.album_key()?;
                let album = track.album.as_deref()?;
                if !seen.insert(key.clone()) {
                    return None;
                }
                let mut item =
                    MediaItem::from_provider(&self.config.provider_id, MediaType::Album, key, album);
                item.artist = track.artist.clone();
                Some(item)
            })
            .collect()
    }

    fn artist_items(&self, tracks: &[ScannedTrack]) -> Vec<MediaItem> {
        let mut seen = HashSet::new();
        tracks
            .iter()
            .filter_map(|track| track.artist.as_deref())
            .filter(|artist| seen.insert(artist.to_string()))
            .map(|artist| {
                MediaItem::from_provider(&self.config.provider_id, MediaType::Artist, artist, artist)
            })
            .collect()
    }

    async fn playlist_items(&self) -> Result<Vec<MediaItem>> {
        let dir = &self.config.playlists_dir;
        if !tokio::fs::try_exists(dir).await? {
            debug!(dir = %dir.display(), "No playlists folder");
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_playlist_file(&path) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        let mut items = Vec::with_capacity(names.len());
        for name in names {
            items.push(self.playlist_item(&name).await?);
        }
        Ok(items)
    }

    async fn playlist_item(&self, playlist_id: &str) -> Result<MediaItem> {
        let path = self.playlist_path(playlist_id)?;
        let metadata = tokio::fs::metadata(&path).await?;
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(playlist_id);

        Ok(
            MediaItem::from_provider(&self.config.provider_id, MediaType::Playlist, playlist_id, name)
                .with_checksum(modified.to_string())
                .editable(),
        )
    }

    /// File of a playlist id, which must be a bare `.m3u`/`.m3u8` file name.
    fn playlist_path(&self, playlist_id: &str) -> Result<PathBuf> {
        let candidate = Path::new(playlist_id);
        let bare = candidate.components().count() == 1
            && matches!(candidate.components().next(), Some(Component::Normal(_)));
        if !bare || !is_playlist_file(candidate) {
            return Err(LocalFilesError::InvalidPlaylist(playlist_id.to_string()));
        }
        Ok(self.config.playlists_dir.join(playlist_id))
    }

    async fn read_playlist(&self, playlist_id: &str) -> Result<(PathBuf, String)> {
        let path = self.playlist_path(playlist_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok((path, content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LocalFilesError::PlaylistNotFound(playlist_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Absolute path of a track id, rejecting ids that leave the music folder.
    fn track_path(&self, track_id: &str) -> Option<PathBuf> {
        let relative = Path::new(track_id);
        let inside = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        inside.then(|| self.config.music_dir.join(relative))
    }

    /// Identity of a playlist entry: our own track id, or the URI.
    fn entry_key(&self, entry: &Entry) -> String {
        match entry {
            Entry::Uri { provider, item_id } if *provider == self.config.provider_id => item_id.clone(),
            Entry::Uri { provider, item_id } => format!("{}://{}", provider, item_id),
            Entry::Path(path) => {
                let absolute = self.config.playlists_dir.join(path);
                scanner::track_id(&self.config.music_dir, &absolute).unwrap_or_else(|| path.clone())
            }
        }
    }

    /// Line written for an id handed to [`MusicProvider::add_playlist_tracks`].
    fn entry_line(&self, track_id: &str) -> String {
        if track_id.contains("://") {
            return track_id.to_string();
        }
        match self.track_path(track_id) {
            Some(path) => path.to_string_lossy().into_owned(),
            None => track_id.to_string(),
        }
    }
}

fn is_playlist_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PLAYLIST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl MusicProvider for LocalFilesProvider {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::UriPassthrough
    }

    fn supported_media_types(&self) -> Vec<MediaType> {
        vec![
            MediaType::Artist,
            MediaType::Album,
            MediaType::Track,
            MediaType::Playlist,
        ]
    }

    #[instrument(skip(self), fields(provider_id = %self.config.provider_id))]
    async fn list_library(&self, media_type: MediaType) -> BridgeResult<CatalogListing> {
        let items: Vec<MediaItem> = match media_type {
            MediaType::Track => {
                let tracks = self.scan().await?;
                tracks.iter().map(|t| self.track_item(t)).collect()
            }
            MediaType::Album => self.album_items(&self.scan().await?),
            MediaType::Artist => self.artist_items(&self.scan().await?),
            MediaType::Playlist => self.playlist_items().await?,
            MediaType::Radio => Vec::new(),
        };

        debug!(count = items.len(), "Listed local library");
        Ok(listing_from_vec(items.into_iter().map(Ok).collect()))
    }

    async fn get_item(&self, media_type: MediaType, item_id: &str) -> BridgeResult<Option<MediaItem>> {
        match media_type {
            MediaType::Track => {
                let Some(path) = self.track_path(item_id) else {
                    return Ok(None);
                };
                let root = self.config.music_dir.clone();
                let track = tokio::task::spawn_blocking(move || {
                    (path.is_file() && scanner::is_audio_file(&path))
                        .then(|| scanner::read_track(&root, &path))
                        .flatten()
                })
                .await
                .map_err(|e| LocalFilesError::Task(e.to_string()))?;
                Ok(track.map(|t| self.track_item(&t)))
            }
            MediaType::Playlist => match self.playlist_item(item_id).await {
                Ok(item) => Ok(Some(item)),
                Err(LocalFilesError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(LocalFilesError::InvalidPlaylist(_)) => Ok(None),
                Err(e) => Err(e.into()),
            },
            MediaType::Album => {
                let albums = self.album_items(&self.scan().await?);
                Ok(albums.into_iter().find(|a| a.item_id == item_id))
            }
            MediaType::Artist => {
                let artists = self.artist_items(&self.scan().await?);
                Ok(artists.into_iter().find(|a| a.item_id == item_id))
            }
            MediaType::Radio => Ok(None),
        }
    }

    async fn album_tracks(&self, album_id: &str) -> BridgeResult<Vec<MediaItem>> {
        let tracks = self.scan().await?;
        Ok(tracks
            .iter()
            .filter(|t| t.album_key().as_deref() == Some(album_id))
            .map(|t| self.track_item(t))
            .collect())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> BridgeResult<Vec<MediaItem>> {
        let (_, content) = self.read_playlist(playlist_id).await?;
        let entries = m3u::entries(&content);

        let root = self.config.music_dir.clone();
        let base = self.config.playlists_dir.clone();
        let provider_id = self.config.provider_id.clone();
        let items = tokio::task::spawn_blocking(move || {
            entries
                .into_iter()
                .map(|entry| resolve_entry(&provider_id, &root, &base, entry))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| LocalFilesError::Task(e.to_string()))?;

        Ok(items)
    }

    #[instrument(skip(self, track_ids), fields(count = track_ids.len()))]
    async fn add_playlist_tracks(&self, playlist_id: &str, track_ids: &[String]) -> BridgeResult<bool> {
        let path = self.playlist_path(playlist_id)?;
        tokio::fs::create_dir_all(&self.config.playlists_dir)
            .await
            .map_err(LocalFilesError::from)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(LocalFilesError::from(e).into()),
        };

        let lines: Vec<String> = track_ids.iter().map(|id| self.entry_line(id)).collect();
        tokio::fs::write(&path, m3u::append(&content, &lines))
            .await
            .map_err(LocalFilesError::from)?;

        info!(playlist_id, added = lines.len(), "Appended playlist entries");
        Ok(true)
    }

    #[instrument(skip(self, track_ids), fields(count = track_ids.len()))]
    async fn remove_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> BridgeResult<bool> {
        let (path, content) = self.read_playlist(playlist_id).await?;
        let targets: HashSet<&str> = track_ids.iter().map(String::as_str).collect();

        let (updated, removed) = m3u::retain(&content, |entry| {
            targets.contains(self.entry_key(entry).as_str())
        });
        if removed == 0 {
            return Ok(false);
        }

        tokio::fs::write(&path, updated)
            .await
            .map_err(LocalFilesError::from)?;
        info!(playlist_id, removed, "Removed playlist entries");
        Ok(true)
    }
}

/// Track view of one playlist entry. Blocking.
fn resolve_entry(provider_id: &str, root: &Path, base: &Path, entry: Entry) -> MediaItem {
    match entry {
        Entry::Uri { provider, item_id } if provider != provider_id => {
            MediaItem::from_provider(provider, MediaType::Track, item_id.clone(), item_id)
        }
        Entry::Uri { item_id, .. } => local_entry(provider_id, root, &root.join(&item_id), &item_id),
        Entry::Path(line) => local_entry(provider_id, root, &base.join(&line), &line),
    }
}

fn local_entry(provider_id: &str, root: &Path, path: &Path, raw: &str) -> MediaItem {
    let scanned = path
        .is_file()
        .then(|| scanner::read_track(root, path))
        .flatten();

    match scanned {
        Some(track) => {
            let mut item =
                MediaItem::from_provider(provider_id, MediaType::Track, track.id, track.title);
            item.artist = track.artist;
            item.album = track.album;
            item
        }
        None => {
            let name = Path::new(raw)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(raw)
                .to_string();
            MediaItem::from_provider(provider_id, MediaType::Track, raw, name).unavailable()
        }
    }
}
