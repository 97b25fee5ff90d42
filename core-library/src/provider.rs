//! Music provider contract and registry
//!
//! A provider is an external catalog exposing listing and library-mutation
//! operations for a declared subset of media types. Providers are held in a
//! [`ProviderRegistry`] keyed by id; iteration follows registration order.

use crate::models::{MediaItem, MediaType};
use async_trait::async_trait;
use bridge_traits::error::Result;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::info;

/// A provider's catalog for one media type.
///
/// Lazy, finite and non-restartable. Every element carries its own
/// success/failure signal; a consumer must treat any `Err` as "the listing
/// is incomplete".
pub type CatalogListing = BoxStream<'static, Result<MediaItem>>;

/// Wrap an already materialised listing.
pub fn listing_from_vec(items: Vec<Result<MediaItem>>) -> CatalogListing {
    stream::iter(items).boxed()
}

/// How the engine treats a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// The library's own store exposed as a provider; never synced
    Local,
    /// A remote catalog that only accepts its own item ids
    Remote,
    /// A catalog whose playlists accept `provider://item_id` references
    /// from any other provider
    UriPassthrough,
}

#[async_trait]
pub trait MusicProvider: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    fn supported_media_types(&self) -> Vec<MediaType>;

    /// Whether periodic and registration-triggered syncs apply.
    fn is_catalog(&self) -> bool {
        self.kind() != ProviderKind::Local && !self.supported_media_types().is_empty()
    }

    /// The user's library on this provider for one media type.
    async fn list_library(&self, media_type: MediaType) -> Result<CatalogListing>;

    async fn get_item(&self, _media_type: MediaType, _item_id: &str) -> Result<Option<MediaItem>> {
        Ok(None)
    }

    async fn album_tracks(&self, _album_id: &str) -> Result<Vec<MediaItem>> {
        Ok(Vec::new())
    }

    async fn playlist_tracks(&self, _playlist_id: &str) -> Result<Vec<MediaItem>> {
        Ok(Vec::new())
    }

    /// Add an item to the user's library on the provider.
    async fn library_add(&self, _item_id: &str, _media_type: MediaType) -> Result<bool> {
        Ok(false)
    }

    async fn library_remove(&self, _item_id: &str, _media_type: MediaType) -> Result<bool> {
        Ok(false)
    }

    /// Append tracks to a provider playlist. Entries are provider item ids,
    /// or `provider://item_id` URIs for [`ProviderKind::UriPassthrough`].
    async fn add_playlist_tracks(&self, _playlist_id: &str, _track_ids: &[String]) -> Result<bool> {
        Ok(false)
    }

    async fn remove_playlist_tracks(
        &self,
        _playlist_id: &str,
        _track_ids: &[String],
    ) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Default)]
struct RegistryInner {
    providers: HashMap<String, Arc<dyn MusicProvider>>,
    order: Vec<String>,
}

/// Registered providers by id.
#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<RegistryInner>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one with the same id.
    /// Returns the replaced provider.
    pub fn register(&self, provider: Arc<dyn MusicProvider>) -> Option<Arc<dyn MusicProvider>> {
        let id = provider.id().to_string();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        info!(
            provider_id = %id,
            kind = ?provider.kind(),
            media_types = ?provider.supported_media_types(),
            "Registering provider"
        );

        let previous = inner.providers.insert(id.clone(), provider);
        if previous.is_none() {
            inner.order.push(id);
        }
        previous
    }

    pub fn unregister(&self, provider_id: &str) -> Option<Arc<dyn MusicProvider>> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let removed = inner.providers.remove(provider_id);
        if removed.is_some() {
            inner.order.retain(|id| id != provider_id);
        }
        removed
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn MusicProvider>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.providers.get(provider_id).cloned()
    }

    /// All providers in registration order.
    pub fn all(&self) -> Vec<Arc<dyn MusicProvider>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .order
            .iter()
            .filter_map(|id| inner.providers.get(id).cloned())
            .collect()
    }

    /// Providers that take part in library sync, in registration order.
    pub fn catalog_providers(&self) -> Vec<Arc<dyn MusicProvider>> {
        self.all().into_iter().filter(|p| p.is_catalog()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .providers
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("ProviderRegistry")
            .field("providers", &inner.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubProvider {
        id: &'static str,
        kind: ProviderKind,
        media_types: Vec<MediaType>,
    }

    #[async_trait]
    impl MusicProvider for StubProvider {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn supported_media_types(&self) -> Vec<MediaType> {
            self.media_types.clone()
        }

        async fn list_library(&self, media_type: MediaType) -> Result<CatalogListing> {
            Ok(listing_from_vec(vec![Ok(MediaItem::from_provider(
                self.id, media_type, "1", "one",
            ))]))
        }
    }

    fn stub(id: &'static str, kind: ProviderKind, media_types: Vec<MediaType>) -> Arc<dyn MusicProvider> {
        Arc::new(StubProvider {
            id,
            kind,
            media_types,
        })
    }

    #[test]
    fn test_registration_order_and_replacement() {
        let registry = ProviderRegistry::new();
        assert!(registry.register(stub("spotify", ProviderKind::Remote, vec![MediaType::Track])).is_none());
        assert!(registry.register(stub("filesystem", ProviderKind::UriPassthrough, vec![MediaType::Playlist])).is_none());
        assert!(registry.register(stub("spotify", ProviderKind::Remote, vec![MediaType::Album])).is_some());

        let ids: Vec<String> = registry.all().iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["spotify", "filesystem"]);
        assert_eq!(
            registry.get("spotify").unwrap().supported_media_types(),
            vec![MediaType::Album]
        );
    }

    #[test]
    fn test_catalog_providers_excludes_local_and_empty() {
        let registry = ProviderRegistry::new();
        registry.register(stub("library", ProviderKind::Local, MediaType::ALL.to_vec()));
        registry.register(stub("webhooks", ProviderKind::Remote, vec![]));
        registry.register(stub("spotify", ProviderKind::Remote, vec![MediaType::Artist]));

        let catalog: Vec<String> = registry
            .catalog_providers()
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(catalog, vec!["spotify"]);
    }

    #[test]
    fn test_unregister() {
        let registry = ProviderRegistry::new();
        registry.register(stub("spotify", ProviderKind::Remote, vec![MediaType::Track]));
        assert!(registry.unregister("spotify").is_some());
        assert!(registry.unregister("spotify").is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_default_operations_decline() {
        let provider = stub("spotify", ProviderKind::Remote, vec![MediaType::Track]);
        assert!(!provider.library_add("1", MediaType::Track).await.unwrap());
        assert!(!provider
            .add_playlist_tracks("pl", &["1".to_string()])
            .await
            .unwrap());
        assert!(provider.album_tracks("a").await.unwrap().is_empty());

        let items: Vec<_> = provider.list_library(MediaType::Track).await.unwrap().collect().await;
        assert_eq!(items.len(), 1);
    }
}
