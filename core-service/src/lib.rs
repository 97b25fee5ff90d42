//! Core service façade and bootstrap.
//!
//! [`LibraryService::bootstrap`] turns a [`CoreConfig`] into a running
//! library: SQLite pool and migrations, store, cache, provider registry,
//! resolver, event bus, sync coordinator and scheduler. Hosts then register
//! providers and drive the library through the service.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::LibraryService;
//!
//! let config = CoreConfig::builder().database_path("library.db").build()?;
//! let service = LibraryService::bootstrap(config).await?;
//! service.register_provider(my_provider);
//! // ...
//! service.shutdown().await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::cache::KeyValueCache;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{
    LibraryResolver, LibraryStore, MediaItem, MediaType, MusicProvider, OrderBy,
    ProviderRegistry, SqliteKeyValueCache, SqliteLibraryStore,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, Receiver};
use core_runtime::logging::init_logging;
use core_sync::{
    FullSyncSummary, SchedulerHandle, SyncConfig, SyncContext, SyncCoordinator, SyncQueue,
    SyncRun, SyncScheduler,
};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[cfg(feature = "local-files")]
pub use provider_local_files::{LocalFilesConfig, LocalFilesProvider};

/// Primary façade exposed to host applications.
pub struct LibraryService {
    config: CoreConfig,
    store: Arc<SqliteLibraryStore>,
    coordinator: Arc<SyncCoordinator>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl LibraryService {
    /// Build every collaborator from `config` and start the scheduler.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        if let Some(logging) = config.logging.clone() {
            init_logging(logging)?;
        }

        info!(database = %config.database_path.display(), "Bootstrapping library service");

        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let store = Arc::new(SqliteLibraryStore::new(pool.clone()));
        let cache = Arc::new(SqliteKeyValueCache::with_clock(
            pool,
            Arc::clone(&config.clock),
        ));

        match cache.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Dropped expired cache entries"),
            Err(e) => warn!(error = %e, "Could not purge expired cache entries"),
        }

        let providers = Arc::new(ProviderRegistry::new());
        let resolver = Arc::new(LibraryResolver::new(
            Arc::clone(&store) as Arc<dyn LibraryStore>,
            Arc::clone(&providers),
        ));
        let event_bus = EventBus::new(config.event_buffer_size);

        let ctx = SyncContext::new(
            providers,
            Arc::clone(&store) as Arc<dyn LibraryStore>,
            resolver,
            cache as Arc<dyn KeyValueCache>,
            event_bus,
        )
        .with_clock(Arc::clone(&config.clock));

        let sync_config = SyncConfig::from(&config);
        let (queue, requests) = SyncQueue::bounded(sync_config.queue_capacity);
        let coordinator = Arc::new(SyncCoordinator::new(ctx, sync_config, queue));
        let scheduler = SyncScheduler::start(Arc::clone(&coordinator), requests);

        info!("Library service ready");

        Ok(Self {
            config,
            store,
            coordinator,
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .map(|handle| handle.as_ref().is_some_and(SchedulerHandle::is_running))
            .unwrap_or(false)
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Register a provider. Catalog providers get a full sync queued when
    /// registration syncs are enabled.
    pub fn register_provider(&self, provider: Arc<dyn MusicProvider>) {
        self.coordinator.register_provider(provider);
    }

    pub fn unregister_provider(&self, provider_id: &str) -> bool {
        self.coordinator.unregister_provider(provider_id)
    }

    /// Register a local music folder as a provider.
    #[cfg(feature = "local-files")]
    pub fn register_local_files(&self, config: LocalFilesConfig) -> Arc<LocalFilesProvider> {
        let provider = Arc::new(LocalFilesProvider::new(config));
        self.register_provider(Arc::clone(&provider) as Arc<dyn MusicProvider>);
        provider
    }

    pub fn providers(&self) -> Vec<Arc<dyn MusicProvider>> {
        self.coordinator.context().providers.all()
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Sync every supported media type of one provider now.
    pub async fn sync_provider(&self, provider_id: &str) -> Result<FullSyncSummary> {
        Ok(self.coordinator.full_sync(provider_id).await?)
    }

    /// Sync every catalog provider now.
    pub async fn sync_all(&self) -> Vec<FullSyncSummary> {
        self.coordinator.sync_all().await
    }

    /// Queue a sync of one provider for the scheduler.
    pub fn request_provider_sync(&self, provider_id: &str) -> Result<()> {
        Ok(self.coordinator.trigger_provider_sync(provider_id)?)
    }

    pub fn request_full_sync(&self) -> Result<()> {
        Ok(self.coordinator.trigger_full_sync()?)
    }

    pub fn active_runs(&self) -> Vec<SyncRun> {
        self.coordinator.active_runs()
    }

    // =========================================================================
    // Library
    // =========================================================================

    pub async fn library_items(&self, media_type: MediaType, order_by: OrderBy) -> Result<Vec<MediaItem>> {
        Ok(self.coordinator.library_items(media_type, order_by).await?)
    }

    pub async fn library_item(&self, media_type: MediaType, item_id: &str) -> Result<Option<MediaItem>> {
        Ok(self.store.get_item(media_type, item_id).await?)
    }

    pub async fn library_playlist_by_name(&self, name: &str) -> Result<Option<MediaItem>> {
        Ok(self.coordinator.library_playlist_by_name(name).await?)
    }

    pub async fn library_radio_by_name(&self, name: &str) -> Result<Option<MediaItem>> {
        Ok(self.coordinator.library_radio_by_name(name).await?)
    }

    pub async fn library_add(&self, item: &MediaItem) -> Result<bool> {
        Ok(self.coordinator.library_add(item).await?)
    }

    pub async fn library_remove(&self, item: &MediaItem) -> Result<bool> {
        Ok(self.coordinator.library_remove(item).await?)
    }

    pub async fn add_playlist_tracks(&self, playlist_id: &str, tracks: &[MediaItem]) -> Result<bool> {
        Ok(self.coordinator.add_playlist_tracks(playlist_id, tracks).await?)
    }

    pub async fn remove_playlist_tracks(&self, playlist_id: &str, tracks: &[MediaItem]) -> Result<bool> {
        Ok(self
            .coordinator
            .remove_playlist_tracks(playlist_id, tracks)
            .await?)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.coordinator.context().event_bus.subscribe()
    }

    pub fn event_stream(&self) -> EventStream {
        EventStream::new(self.subscribe_events())
    }

    /// Stop the scheduler, wait for running syncs and close the database.
    pub async fn shutdown(&self) -> Result<()> {
        let handle = self
            .scheduler
            .lock()
            .ok()
            .and_then(|mut handle| handle.take())
            .ok_or(CoreError::ShutDown)?;

        handle.shutdown().await;
        self.store.pool().close().await;
        info!("Library service stopped");
        Ok(())
    }
}
