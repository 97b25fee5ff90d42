//! Coordinator and scheduler behaviour

mod common;

use common::{harness, FakeProvider, Harness};
use core_library::{MediaItem, MediaType, OrderBy, ProviderKind, ProviderRef, LIBRARY_PROVIDER_ID};
use core_runtime::events::{CoreEvent, SyncEvent};
use core_sync::{
    SyncConfig, SyncCoordinator, SyncError, SyncQueue, SyncRequest, SyncScheduler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc;

fn coordinator(h: &Harness, config: SyncConfig) -> (Arc<SyncCoordinator>, mpsc::Receiver<SyncRequest>) {
    let (queue, requests) = SyncQueue::bounded(config.queue_capacity);
    (
        Arc::new(SyncCoordinator::new(h.ctx.clone(), config, queue)),
        requests,
    )
}

async fn wait_for_completion(events: &mut Receiver<CoreEvent>, provider: &str, kind: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(CoreEvent::Sync(SyncEvent::Completed {
                provider_id,
                kind: completed,
                ..
            })) = events.recv().await
            {
                if provider_id == provider && completed == kind {
                    return;
                }
            }
        }
    })
    .await
    .expect("sync did not complete in time");
}

#[tokio::test]
async fn test_full_sync_runs_supported_types_in_fixed_order() {
    let h = harness().await;
    let provider = h.register(FakeProvider::remote(
        "spotify",
        vec![MediaType::Playlist, MediaType::Track, MediaType::Artist],
    ));
    provider.set_catalog(MediaType::Artist, &["ar1"]);
    provider.set_catalog(MediaType::Track, &["t1"]);
    let (coordinator, _requests) = coordinator(&h, SyncConfig::default());

    let summary = coordinator.full_sync("spotify").await.unwrap();

    assert_eq!(
        *provider.list_calls.lock().unwrap(),
        vec![MediaType::Artist, MediaType::Track, MediaType::Playlist]
    );
    assert!(summary.is_success());
    assert_eq!(
        summary
            .reports
            .iter()
            .map(|r| r.media_type)
            .collect::<Vec<_>>(),
        vec![Some(MediaType::Artist), Some(MediaType::Track), Some(MediaType::Playlist)]
    );
}

#[tokio::test]
async fn test_failing_media_type_does_not_stop_the_rest() {
    let h = harness().await;
    let provider = h.register(FakeProvider::remote(
        "spotify",
        vec![MediaType::Album, MediaType::Track, MediaType::Radio],
    ));
    provider.set_catalog(MediaType::Album, &["al1"]);
    provider.set_failing_catalog(MediaType::Track, &["t1"]);
    provider.set_catalog(MediaType::Radio, &["r1"]);
    let (coordinator, _requests) = coordinator(&h, SyncConfig::default());

    let summary = coordinator.full_sync("spotify").await.unwrap();

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, MediaType::Track);
    assert_eq!(h.members(MediaType::Radio, "spotify").await.len(), 1);
    assert!(coordinator.active_runs().is_empty());
}

#[tokio::test]
async fn test_full_sync_of_unknown_provider() {
    let h = harness().await;
    let (coordinator, _requests) = coordinator(&h, SyncConfig::default());

    let result = coordinator.full_sync("nowhere").await;
    assert!(matches!(result, Err(SyncError::ProviderNotFound(_))));
}

#[tokio::test]
async fn test_sync_all_skips_local_provider() {
    let h = harness().await;
    let local = h.register(FakeProvider::new(
        LIBRARY_PROVIDER_ID,
        ProviderKind::Local,
        MediaType::ALL.to_vec(),
    ));
    let spotify = h.register(FakeProvider::remote("spotify", vec![MediaType::Track]));
    let tidal = h.register(FakeProvider::remote("tidal", vec![MediaType::Album]));
    let (coordinator, _requests) = coordinator(&h, SyncConfig::default());

    let summaries = coordinator.sync_all().await;

    assert_eq!(
        summaries.iter().map(|s| s.provider_id.as_str()).collect::<Vec<_>>(),
        vec!["spotify", "tidal"]
    );
    assert_eq!(local.list_call_count(), 0);
    assert_eq!(spotify.list_call_count(), 1);
    assert_eq!(tidal.list_call_count(), 1);
}

#[tokio::test]
async fn test_registration_queues_sync_for_catalog_providers_only() {
    let h = harness().await;
    let (coordinator, mut requests) = coordinator(&h, SyncConfig::default());
    h.register(FakeProvider::remote("spotify", vec![MediaType::Track]));
    h.register(FakeProvider::new(LIBRARY_PROVIDER_ID, ProviderKind::Local, vec![MediaType::Track]));

    assert!(coordinator.on_provider_registered("spotify").unwrap());
    assert!(!coordinator.on_provider_registered(LIBRARY_PROVIDER_ID).unwrap());
    assert!(!coordinator.on_provider_registered("unknown").unwrap());

    assert_eq!(
        requests.try_recv().unwrap(),
        SyncRequest::Provider("spotify".to_string())
    );
    assert!(requests.try_recv().is_err());
}

#[tokio::test]
async fn test_registration_sync_can_be_disabled() {
    let h = harness().await;
    let config = SyncConfig {
        sync_on_provider_registered: false,
        ..SyncConfig::default()
    };
    let (coordinator, mut requests) = coordinator(&h, config);
    h.register(FakeProvider::remote("spotify", vec![MediaType::Track]));

    assert!(!coordinator.on_provider_registered("spotify").unwrap());
    assert!(requests.try_recv().is_err());
}

#[tokio::test]
async fn test_triggers_write_to_queue() {
    let h = harness().await;
    let (coordinator, mut requests) = coordinator(&h, SyncConfig::default());
    h.register(FakeProvider::remote("spotify", vec![MediaType::Track]));

    assert!(matches!(
        coordinator.trigger_provider_sync("tidal"),
        Err(SyncError::ProviderNotFound(_))
    ));
    coordinator.trigger_provider_sync("spotify").unwrap();
    coordinator.trigger_full_sync().unwrap();

    assert_eq!(
        requests.recv().await,
        Some(SyncRequest::Provider("spotify".to_string()))
    );
    assert_eq!(requests.recv().await, Some(SyncRequest::All));
}

#[tokio::test]
async fn test_library_add_and_remove_for_library_record() {
    let h = harness().await;
    let spotify = h.register(FakeProvider::remote("spotify", vec![MediaType::Track]));
    spotify.set_listing(
        MediaType::Track,
        vec![MediaItem::from_provider("spotify", MediaType::Track, "t1", "Song")
            .with_provider_ref(ProviderRef::new("qobuz", "qb1", 5))],
    );
    let (coordinator, _requests) = coordinator(&h, SyncConfig::default());
    coordinator.full_sync("spotify").await.unwrap();
    let record_id = h.library_id(MediaType::Track, "spotify", "t1").await;
    let record = h.store.get(MediaType::Track, &record_id).await;

    // qobuz is not registered and is skipped
    assert!(coordinator.library_add(&record).await.unwrap());
    assert_eq!(
        *spotify.library_adds.lock().unwrap(),
        vec![("t1".to_string(), MediaType::Track)]
    );
    assert_eq!(
        h.members(MediaType::Track, LIBRARY_PROVIDER_ID).await,
        vec![record_id.clone()]
    );

    assert!(coordinator.library_remove(&record).await.unwrap());
    assert_eq!(
        *spotify.library_removes.lock().unwrap(),
        vec![("t1".to_string(), MediaType::Track)]
    );
    assert!(h.members(MediaType::Track, LIBRARY_PROVIDER_ID).await.is_empty());
    assert_eq!(h.members(MediaType::Track, "spotify").await, vec![record_id]);
}

#[tokio::test]
async fn test_library_add_for_provider_item() {
    let h = harness().await;
    let spotify = h.register(FakeProvider::remote("spotify", vec![MediaType::Album]));
    let (coordinator, _requests) = coordinator(&h, SyncConfig::default());

    let album = MediaItem::from_provider("spotify", MediaType::Album, "al9", "Album");
    assert!(coordinator.library_add(&album).await.unwrap());
    assert_eq!(
        *spotify.library_adds.lock().unwrap(),
        vec![("al9".to_string(), MediaType::Album)]
    );
    assert!(h.members(MediaType::Album, LIBRARY_PROVIDER_ID).await.is_empty());

    let unknown = MediaItem::from_provider("deezer", MediaType::Album, "dz1", "Album");
    assert!(!coordinator.library_add(&unknown).await.unwrap());
}

#[tokio::test]
async fn test_library_queries() {
    let h = harness().await;
    let provider = h.register(FakeProvider::remote(
        "spotify",
        vec![MediaType::Playlist, MediaType::Radio],
    ));
    provider.set_listing(
        MediaType::Playlist,
        vec![
            MediaItem::from_provider("spotify", MediaType::Playlist, "pl1", "Workout"),
            MediaItem::from_provider("spotify", MediaType::Playlist, "pl2", "Chill"),
        ],
    );
    provider.set_catalog(MediaType::Radio, &["r1"]);
    let (coordinator, _requests) = coordinator(&h, SyncConfig::default());
    coordinator.full_sync("spotify").await.unwrap();

    let playlists = coordinator
        .library_items(MediaType::Playlist, OrderBy::Name)
        .await
        .unwrap();
    assert_eq!(
        playlists.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["Chill", "Workout"]
    );

    let workout = coordinator.library_playlist_by_name("Workout").await.unwrap();
    assert_eq!(workout.map(|p| p.name), Some("Workout".to_string()));
    assert!(coordinator.library_playlist_by_name("Focus").await.unwrap().is_none());
    assert!(coordinator.library_radio_by_name("Item r1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_scheduler_syncs_registered_provider() {
    let h = harness().await;
    let config = SyncConfig {
        enable_periodic_sync: false,
        ..SyncConfig::default()
    };
    let (coordinator, requests) = coordinator(&h, config);
    let handle = SyncScheduler::start(Arc::clone(&coordinator), requests);
    let mut events = h.event_bus.subscribe();

    let provider = Arc::new(FakeProvider::remote("spotify", vec![MediaType::Track]));
    provider.set_catalog(MediaType::Track, &["t1", "t2"]);
    coordinator.register_provider(provider.clone());

    wait_for_completion(&mut events, "spotify", "tracks").await;
    assert_eq!(h.members(MediaType::Track, "spotify").await.len(), 2);

    handle.shutdown().await;
    assert!(matches!(coordinator.trigger_full_sync(), Err(SyncError::QueueClosed)));
}

#[tokio::test]
async fn test_periodic_timer_syncs_catalog_providers() {
    let h = harness().await;
    let config = SyncConfig {
        initial_sync_delay: Duration::from_millis(20),
        sync_interval: Duration::from_secs(3600),
        sync_on_provider_registered: false,
        ..SyncConfig::default()
    };
    let (coordinator, requests) = coordinator(&h, config);
    let provider = h.register(FakeProvider::remote("spotify", vec![MediaType::Album]));
    provider.set_catalog(MediaType::Album, &["al1"]);
    let mut events = h.event_bus.subscribe();

    let handle = SyncScheduler::start(Arc::clone(&coordinator), requests);
    assert!(handle.is_running());

    wait_for_completion(&mut events, "spotify", "albums").await;
    assert_eq!(provider.list_call_count(), 1);

    handle.shutdown().await;
}
