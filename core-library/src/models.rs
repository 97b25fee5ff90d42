//! Domain models for the media library
//!
//! A [`MediaItem`] is either the library's own canonical record
//! ([`Origin::Library`]) or a provider-native view of an item
//! ([`Origin::Provider`]). Both carry the [`ProviderRef`]s used to decide
//! whether two views describe the same entity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Provider id under which the library records membership of its own items.
pub const LIBRARY_PROVIDER_ID: &str = "library";

/// Generates a fresh identifier for a library-owned record.
pub fn new_library_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Media Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Artist,
    Album,
    Track,
    Playlist,
    Radio,
}

impl MediaType {
    /// Every media type, in full-sync order.
    pub const ALL: [MediaType; 5] = [
        MediaType::Artist,
        MediaType::Album,
        MediaType::Track,
        MediaType::Playlist,
        MediaType::Radio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Artist => "artist",
            MediaType::Album => "album",
            MediaType::Track => "track",
            MediaType::Playlist => "playlist",
            MediaType::Radio => "radio",
        }
    }

    /// Plural form, used as the sync kind and in cache keys.
    pub fn plural(&self) -> &'static str {
        match self {
            MediaType::Artist => "artists",
            MediaType::Album => "albums",
            MediaType::Track => "tracks",
            MediaType::Playlist => "playlists",
            MediaType::Radio => "radios",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artist" | "artists" => Ok(MediaType::Artist),
            "album" | "albums" => Ok(MediaType::Album),
            "track" | "tracks" => Ok(MediaType::Track),
            "playlist" | "playlists" => Ok(MediaType::Playlist),
            "radio" | "radios" => Ok(MediaType::Radio),
            other => Err(format!("Unknown media type: {}", other)),
        }
    }
}

// =============================================================================
// Provider references
// =============================================================================

/// One provider's handle on a media item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderRef {
    /// Provider id
    pub provider: String,
    /// Provider-local item id
    pub item_id: String,
    /// Higher is better; ranks several versions on the same provider
    pub quality: i32,
}

impl ProviderRef {
    pub fn new(provider: impl Into<String>, item_id: impl Into<String>, quality: i32) -> Self {
        Self {
            provider: provider.into(),
            item_id: item_id.into(),
            quality,
        }
    }

    /// `provider://item_id`, the form accepted by URI-passthrough providers.
    pub fn uri(&self) -> String {
        format!("{}://{}", self.provider, self.item_id)
    }
}

/// Where a [`MediaItem`] value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "provider", rename_all = "snake_case")]
pub enum Origin {
    /// The library's own canonical record; `item_id` is a library id
    Library,
    /// A provider-native view; `item_id` is the provider's id
    Provider(String),
}

impl Origin {
    pub fn is_library(&self) -> bool {
        matches!(self, Origin::Library)
    }
}

// =============================================================================
// Media Item
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub item_id: String,
    pub media_type: MediaType,
    pub name: String,
    pub origin: Origin,
    pub available: bool,
    pub provider_refs: Vec<ProviderRef>,
    /// Playlists only: whether tracks may be added or removed
    pub is_editable: bool,
    /// Playlists only: opaque version marker
    pub checksum: Option<String>,
    pub owner: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl MediaItem {
    /// A provider-native item with a single reference back to itself.
    pub fn from_provider(
        provider: impl Into<String>,
        media_type: MediaType,
        item_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        let item_id = item_id.into();
        Self {
            provider_refs: vec![ProviderRef::new(provider.clone(), item_id.clone(), 0)],
            item_id,
            media_type,
            name: name.into(),
            origin: Origin::Provider(provider),
            available: true,
            is_editable: false,
            checksum: None,
            owner: None,
            artist: None,
            album: None,
        }
    }

    /// A library-owned record with a fresh id, carrying over everything
    /// else from `source`.
    pub fn library_copy(source: &MediaItem) -> Self {
        Self {
            item_id: new_library_id(),
            origin: Origin::Library,
            ..source.clone()
        }
    }

    /// Sets the quality of every reference.
    pub fn with_quality(mut self, quality: i32) -> Self {
        for provider_ref in &mut self.provider_refs {
            provider_ref.quality = quality;
        }
        self
    }

    pub fn with_provider_ref(mut self, provider_ref: ProviderRef) -> Self {
        self.provider_refs.push(provider_ref);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn editable(mut self) -> Self {
        self.is_editable = true;
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Provider whose view this is, or `None` for a library record.
    pub fn source_provider(&self) -> Option<&str> {
        match &self.origin {
            Origin::Library => None,
            Origin::Provider(provider) => Some(provider),
        }
    }

    /// All references on `provider`, best quality first.
    pub fn refs_for<'a>(&'a self, provider: &str) -> Vec<&'a ProviderRef> {
        let mut refs: Vec<&ProviderRef> = self
            .provider_refs
            .iter()
            .filter(|r| r.provider == provider)
            .collect();
        refs.sort_by(|a, b| b.quality.cmp(&a.quality));
        refs
    }

    /// Highest-quality reference on any provider, the earliest on ties.
    pub fn best_ref(&self) -> Option<&ProviderRef> {
        self.provider_refs.iter().rev().max_by_key(|r| r.quality)
    }

    /// The item's own id plus the item id of every reference.
    pub fn known_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.item_id.as_str())
            .chain(self.provider_refs.iter().map(|r| r.item_id.as_str()))
    }

    /// Adds references not already present, keeping existing qualities.
    pub fn merge_refs(&mut self, other: &[ProviderRef]) {
        for candidate in other {
            let exists = self
                .provider_refs
                .iter()
                .any(|r| r.provider == candidate.provider && r.item_id == candidate.item_id);
            if !exists {
                self.provider_refs.push(candidate.clone());
            }
        }
    }
}

// =============================================================================
// Query and update parameters
// =============================================================================

/// Sort key for library listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    Name,
    DateAdded,
    LastModified,
}

impl FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(OrderBy::Name),
            "date_added" | "timestamp" => Ok(OrderBy::DateAdded),
            "last_modified" => Ok(OrderBy::LastModified),
            other => Err(format!("Unknown sort key: {}", other)),
        }
    }
}

/// A single playlist column update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistField {
    Checksum(String),
    Name(String),
}
