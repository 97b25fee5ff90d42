//! Shared fakes for the sync integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::cache::KeyValueCache;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::time::ManualClock;
use core_library::db::create_test_pool;
use core_library::{
    listing_from_vec, CatalogListing, LibraryResolver, LibraryStore, MediaItem, MediaType,
    MusicProvider, OrderBy, PlaylistField, ProviderKind, ProviderRegistry, SqliteKeyValueCache,
    SqliteLibraryStore,
};
use core_runtime::events::EventBus;
use core_sync::SyncContext;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const CLOCK_MILLIS: i64 = 1_700_000_000_000;

// ============================================================================
// Fake provider
// ============================================================================

/// Holds `list_library` until released, announcing when it was entered.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

type ListingEntry = Result<MediaItem, String>;

pub struct FakeProvider {
    id: String,
    kind: ProviderKind,
    media_types: Vec<MediaType>,
    listings: Mutex<HashMap<MediaType, Vec<ListingEntry>>>,
    album_tracks: Mutex<HashMap<String, Vec<MediaItem>>>,
    playlist_tracks: Mutex<HashMap<String, Vec<MediaItem>>>,
    items: Mutex<HashMap<String, MediaItem>>,
    gate: Option<Arc<Gate>>,
    pub list_calls: Mutex<Vec<MediaType>>,
    pub playlist_adds: Mutex<Vec<(String, Vec<String>)>>,
    pub playlist_removes: Mutex<Vec<(String, Vec<String>)>>,
    pub library_adds: Mutex<Vec<(String, MediaType)>>,
    pub library_removes: Mutex<Vec<(String, MediaType)>>,
}

impl FakeProvider {
    pub fn new(id: &str, kind: ProviderKind, media_types: Vec<MediaType>) -> Self {
        Self {
            id: id.to_string(),
            kind,
            media_types,
            listings: Mutex::new(HashMap::new()),
            album_tracks: Mutex::new(HashMap::new()),
            playlist_tracks: Mutex::new(HashMap::new()),
            items: Mutex::new(HashMap::new()),
            gate: None,
            list_calls: Mutex::new(Vec::new()),
            playlist_adds: Mutex::new(Vec::new()),
            playlist_removes: Mutex::new(Vec::new()),
            library_adds: Mutex::new(Vec::new()),
            library_removes: Mutex::new(Vec::new()),
        }
    }

    pub fn remote(id: &str, media_types: Vec<MediaType>) -> Self {
        Self::new(id, ProviderKind::Remote, media_types)
    }

    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Replace the listing for a media type with one item per id.
    pub fn set_catalog(&self, media_type: MediaType, ids: &[&str]) {
        let items = ids
            .iter()
            .map(|id| Ok(MediaItem::from_provider(&self.id, media_type, *id, format!("Item {}", id))))
            .collect();
        self.listings.lock().unwrap().insert(media_type, items);
    }

    pub fn set_listing(&self, media_type: MediaType, items: Vec<MediaItem>) {
        self.listings
            .lock()
            .unwrap()
            .insert(media_type, items.into_iter().map(Ok).collect());
    }

    /// Listing that yields `ids` and then fails.
    pub fn set_failing_catalog(&self, media_type: MediaType, ids: &[&str]) {
        let mut items: Vec<ListingEntry> = ids
            .iter()
            .map(|id| Ok(MediaItem::from_provider(&self.id, media_type, *id, format!("Item {}", id))))
            .collect();
        items.push(Err("connection reset by peer".to_string()));
        self.listings.lock().unwrap().insert(media_type, items);
    }

    pub fn set_album_tracks(&self, album_id: &str, tracks: Vec<MediaItem>) {
        self.album_tracks
            .lock()
            .unwrap()
            .insert(album_id.to_string(), tracks);
    }

    pub fn set_playlist_tracks(&self, playlist_id: &str, tracks: Vec<MediaItem>) {
        self.playlist_tracks
            .lock()
            .unwrap()
            .insert(playlist_id.to_string(), tracks);
    }

    pub fn set_item(&self, item: MediaItem) {
        self.items.lock().unwrap().insert(item.item_id.clone(), item);
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MusicProvider for FakeProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn supported_media_types(&self) -> Vec<MediaType> {
        self.media_types.clone()
    }

    async fn list_library(&self, media_type: MediaType) -> BridgeResult<CatalogListing> {
        self.list_calls.lock().unwrap().push(media_type);

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let entries = self
            .listings
            .lock()
            .unwrap()
            .get(&media_type)
            .cloned()
            .unwrap_or_default();
        Ok(listing_from_vec(
            entries
                .into_iter()
                .map(|entry| entry.map_err(BridgeError::OperationFailed))
                .collect(),
        ))
    }

    async fn get_item(&self, _media_type: MediaType, item_id: &str) -> BridgeResult<Option<MediaItem>> {
        Ok(self.items.lock().unwrap().get(item_id).cloned())
    }

    async fn album_tracks(&self, album_id: &str) -> BridgeResult<Vec<MediaItem>> {
        Ok(self
            .album_tracks
            .lock()
            .unwrap()
            .get(album_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> BridgeResult<Vec<MediaItem>> {
        Ok(self
            .playlist_tracks
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn library_add(&self, item_id: &str, media_type: MediaType) -> BridgeResult<bool> {
        self.library_adds
            .lock()
            .unwrap()
            .push((item_id.to_string(), media_type));
        Ok(true)
    }

    async fn library_remove(&self, item_id: &str, media_type: MediaType) -> BridgeResult<bool> {
        self.library_removes
            .lock()
            .unwrap()
            .push((item_id.to_string(), media_type));
        Ok(true)
    }

    async fn add_playlist_tracks(&self, playlist_id: &str, track_ids: &[String]) -> BridgeResult<bool> {
        self.playlist_adds
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), track_ids.to_vec()));
        Ok(true)
    }

    async fn remove_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> BridgeResult<bool> {
        self.playlist_removes
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), track_ids.to_vec()));
        Ok(true)
    }
}

// ============================================================================
// Counting store
// ============================================================================

/// SQLite store that counts every mutation.
pub struct CountingStore {
    inner: SqliteLibraryStore,
    pub mutations: AtomicUsize,
    pub removed: Mutex<Vec<(String, MediaType, String)>>,
    pub added: Mutex<Vec<(String, MediaType, String)>>,
}

impl CountingStore {
    pub fn new(inner: SqliteLibraryStore) -> Self {
        Self {
            inner,
            mutations: AtomicUsize::new(0),
            removed: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
        }
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn removed_ids(&self) -> Vec<String> {
        self.removed
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, _)| id.clone())
            .collect()
    }

    /// Stored record, panicking when absent.
    pub async fn get(&self, media_type: MediaType, item_id: &str) -> MediaItem {
        self.inner
            .get_item(media_type, item_id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no {} record {}", media_type, item_id))
    }

    pub async fn contains(&self, media_type: MediaType, item_id: &str) -> bool {
        self.inner.get_item(media_type, item_id).await.unwrap().is_some()
    }

    fn bump(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LibraryStore for CountingStore {
    async fn get_item(
        &self,
        media_type: MediaType,
        item_id: &str,
    ) -> core_library::Result<Option<MediaItem>> {
        self.inner.get_item(media_type, item_id).await
    }

    async fn find_by_provider_ref(
        &self,
        media_type: MediaType,
        provider: &str,
        provider_item_id: &str,
    ) -> core_library::Result<Option<MediaItem>> {
        self.inner
            .find_by_provider_ref(media_type, provider, provider_item_id)
            .await
    }

    async fn insert_item(&self, item: &MediaItem) -> core_library::Result<()> {
        self.bump();
        self.inner.insert_item(item).await
    }

    async fn update_item(&self, item: &MediaItem) -> core_library::Result<()> {
        self.bump();
        self.inner.update_item(item).await
    }

    async fn add_to_library(
        &self,
        item_id: &str,
        media_type: MediaType,
        provider: &str,
    ) -> core_library::Result<()> {
        self.bump();
        self.added
            .lock()
            .unwrap()
            .push((item_id.to_string(), media_type, provider.to_string()));
        self.inner.add_to_library(item_id, media_type, provider).await
    }

    async fn remove_from_library(
        &self,
        item_id: &str,
        media_type: MediaType,
        provider: &str,
    ) -> core_library::Result<()> {
        self.bump();
        self.removed
            .lock()
            .unwrap()
            .push((item_id.to_string(), media_type, provider.to_string()));
        self.inner
            .remove_from_library(item_id, media_type, provider)
            .await
    }

    async fn update_playlist(&self, item_id: &str, field: PlaylistField) -> core_library::Result<()> {
        self.bump();
        self.inner.update_playlist(item_id, field).await
    }

    async fn list_library(
        &self,
        media_type: MediaType,
        order_by: OrderBy,
    ) -> core_library::Result<Vec<MediaItem>> {
        self.inner.list_library(media_type, order_by).await
    }

    async fn library_ids(
        &self,
        media_type: MediaType,
        provider: &str,
    ) -> core_library::Result<Vec<String>> {
        self.inner.library_ids(media_type, provider).await
    }

    async fn find_library_item_by_name(
        &self,
        media_type: MediaType,
        name: &str,
    ) -> core_library::Result<Option<MediaItem>> {
        self.inner.find_library_item_by_name(media_type, name).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub store: Arc<CountingStore>,
    pub providers: Arc<ProviderRegistry>,
    pub cache: Arc<dyn KeyValueCache>,
    pub event_bus: EventBus,
    pub ctx: SyncContext,
}

/// Real SQLite store and cache on one in-memory pool.
pub async fn harness() -> Harness {
    let pool = create_test_pool().await.unwrap();
    let cache: Arc<dyn KeyValueCache> = Arc::new(SqliteKeyValueCache::new(pool.clone()));
    build(pool, cache)
}

/// Real SQLite store with the given cache.
pub async fn harness_with_cache(cache: Arc<dyn KeyValueCache>) -> Harness {
    let pool = create_test_pool().await.unwrap();
    build(pool, cache)
}

fn build(pool: sqlx::SqlitePool, cache: Arc<dyn KeyValueCache>) -> Harness {
    let store = Arc::new(CountingStore::new(SqliteLibraryStore::new(pool)));
    let providers = Arc::new(ProviderRegistry::new());
    let resolver = Arc::new(LibraryResolver::new(store.clone(), providers.clone()));
    let event_bus = EventBus::new(256);

    let ctx = SyncContext::new(
        providers.clone(),
        store.clone(),
        resolver,
        cache.clone(),
        event_bus.clone(),
    )
    .with_clock(Arc::new(ManualClock::at_millis(CLOCK_MILLIS)));

    Harness {
        store,
        providers,
        cache,
        event_bus,
        ctx,
    }
}

impl Harness {
    pub fn register(&self, provider: FakeProvider) -> Arc<FakeProvider> {
        let provider = Arc::new(provider);
        self.providers.register(provider.clone());
        provider
    }

    /// Library ids that are members for `provider`.
    pub async fn members(&self, media_type: MediaType, provider: &str) -> Vec<String> {
        let mut ids = self.store.library_ids(media_type, provider).await.unwrap();
        ids.sort();
        ids
    }

    /// Library id of the record owning a provider item.
    pub async fn library_id(&self, media_type: MediaType, provider: &str, item_id: &str) -> String {
        self.store
            .find_by_provider_ref(media_type, provider, item_id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no record for {}/{}", provider, item_id))
            .item_id
    }

    pub async fn prior_ids(&self, media_type: MediaType, provider: &str) -> Option<Vec<String>> {
        self.cache
            .get(&core_sync::prior_ids_key(media_type, provider))
            .await
            .unwrap()
            .map(|v| serde_json::from_value(v).unwrap())
    }
}
