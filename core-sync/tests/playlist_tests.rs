//! Playlist track mutation through the owning provider

mod common;

use common::{harness, FakeProvider, Harness, CLOCK_MILLIS};
use core_library::{MediaItem, MediaType, ProviderKind, ProviderRef};
use core_runtime::events::{CoreEvent, LibraryEvent};
use core_sync::{EntitySyncer, PlaylistTrackMutator, SyncerOptions};
use std::sync::Arc;

/// Sync one playlist from `provider` into the library and return its id.
async fn library_playlist(h: &Harness, provider: &FakeProvider, editable: bool) -> String {
    let mut playlist = MediaItem::from_provider(provider_id(provider), MediaType::Playlist, "pl1", "Mix")
        .with_checksum("v1");
    if editable {
        playlist = playlist.editable();
    }
    provider.set_listing(MediaType::Playlist, vec![playlist]);

    EntitySyncer::new(MediaType::Playlist, h.ctx.clone(), SyncerOptions::default())
        .sync(provider_id(provider))
        .await
        .unwrap();
    h.library_id(MediaType::Playlist, provider_id(provider), "pl1").await
}

fn provider_id(provider: &FakeProvider) -> &str {
    use core_library::MusicProvider;
    provider.id()
}

fn track(provider: &str, id: &str) -> MediaItem {
    MediaItem::from_provider(provider, MediaType::Track, id, format!("Track {}", id))
}

async fn checksum(h: &Harness, playlist_id: &str) -> Option<String> {
    h.store.get(MediaType::Playlist, playlist_id).await.checksum
}

fn register(h: &Harness, id: &str, kind: ProviderKind) -> Arc<FakeProvider> {
    h.register(FakeProvider::new(id, kind, vec![MediaType::Playlist, MediaType::Track]))
}

#[tokio::test]
async fn test_add_skips_track_already_on_playlist() {
    let h = harness().await;
    let spotify = register(&h, "spotify", ProviderKind::Remote);
    let playlist_id = library_playlist(&h, &spotify, true).await;
    spotify.set_playlist_tracks("pl1", vec![track("spotify", "t1")]);

    // a tidal track that also has a spotify version already on the playlist
    let candidate = track("tidal", "td1").with_provider_ref(ProviderRef::new("spotify", "t1", 3));
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());

    let added = mutator.add_tracks(&playlist_id, &[candidate]).await.unwrap();

    assert!(!added);
    assert!(spotify.playlist_adds.lock().unwrap().is_empty());
    assert_eq!(checksum(&h, &playlist_id).await.as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_add_uses_best_same_provider_ref_and_bumps_checksum() {
    let h = harness().await;
    let mut events = h.event_bus.subscribe();
    let spotify = register(&h, "spotify", ProviderKind::Remote);
    let playlist_id = library_playlist(&h, &spotify, true).await;

    let candidate = track("spotify", "low")
        .with_provider_ref(ProviderRef::new("spotify", "high", 8))
        .with_provider_ref(ProviderRef::new("tidal", "td1", 10));
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());

    let added = mutator.add_tracks(&playlist_id, &[candidate.clone(), candidate]).await.unwrap();

    assert!(added);
    assert_eq!(
        *spotify.playlist_adds.lock().unwrap(),
        vec![("pl1".to_string(), vec!["high".to_string()])]
    );
    assert_eq!(checksum(&h, &playlist_id).await, Some(CLOCK_MILLIS.to_string()));

    let mut updated = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Library(LibraryEvent::PlaylistUpdated { playlist_id: id, change_type, checksum }) = event {
            assert_eq!(id, playlist_id);
            assert_eq!(change_type, "tracks_added");
            assert_eq!(checksum, CLOCK_MILLIS.to_string());
            updated = true;
        }
    }
    assert!(updated);
}

#[tokio::test]
async fn test_add_to_universal_playlist_synthesizes_uri() {
    let h = harness().await;
    let files = register(&h, "filesystem", ProviderKind::UriPassthrough);
    let playlist_id = library_playlist(&h, &files, true).await;

    let candidate = track("spotify", "sp1")
        .with_quality(3)
        .with_provider_ref(ProviderRef::new("tidal", "td1", 9));
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());

    assert!(mutator.add_tracks(&playlist_id, &[candidate]).await.unwrap());
    assert_eq!(
        *files.playlist_adds.lock().unwrap(),
        vec![("pl1".to_string(), vec!["tidal://td1".to_string()])]
    );
}

#[tokio::test]
async fn test_universal_playlist_prefers_native_ref() {
    let h = harness().await;
    let files = register(&h, "filesystem", ProviderKind::UriPassthrough);
    let playlist_id = library_playlist(&h, &files, true).await;

    let candidate = track("filesystem", "/music/a.flac")
        .with_provider_ref(ProviderRef::new("tidal", "td1", 9));
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());

    assert!(mutator.add_tracks(&playlist_id, &[candidate]).await.unwrap());
    assert_eq!(
        *files.playlist_adds.lock().unwrap(),
        vec![("pl1".to_string(), vec!["/music/a.flac".to_string()])]
    );
}

#[tokio::test]
async fn test_remote_playlist_skips_foreign_tracks() {
    let h = harness().await;
    let spotify = register(&h, "spotify", ProviderKind::Remote);
    let playlist_id = library_playlist(&h, &spotify, true).await;
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());

    let added = mutator
        .add_tracks(&playlist_id, &[track("tidal", "td1")])
        .await
        .unwrap();

    assert!(!added);
    assert!(spotify.playlist_adds.lock().unwrap().is_empty());
    assert_eq!(checksum(&h, &playlist_id).await.as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_read_only_or_missing_playlist_declines() {
    let h = harness().await;
    let spotify = register(&h, "spotify", ProviderKind::Remote);
    let playlist_id = library_playlist(&h, &spotify, false).await;
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());
    let tracks = [track("spotify", "t1")];

    assert!(!mutator.add_tracks(&playlist_id, &tracks).await.unwrap());
    assert!(!mutator.remove_tracks(&playlist_id, &tracks).await.unwrap());
    assert!(!mutator.add_tracks("no-such-playlist", &tracks).await.unwrap());
    assert!(spotify.playlist_adds.lock().unwrap().is_empty());
    assert!(spotify.playlist_removes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_collects_every_same_provider_ref() {
    let h = harness().await;
    let spotify = register(&h, "spotify", ProviderKind::Remote);
    let playlist_id = library_playlist(&h, &spotify, true).await;
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());

    let doubled = track("spotify", "t1")
        .with_provider_ref(ProviderRef::new("spotify", "t1-single", 2))
        .with_provider_ref(ProviderRef::new("tidal", "td1", 5));
    let removed = mutator
        .remove_tracks(&playlist_id, &[doubled, track("spotify", "t2")])
        .await
        .unwrap();

    assert!(removed);
    assert_eq!(
        *spotify.playlist_removes.lock().unwrap(),
        vec![(
            "pl1".to_string(),
            vec!["t1".to_string(), "t1-single".to_string(), "t2".to_string()]
        )]
    );
    assert_eq!(checksum(&h, &playlist_id).await, Some(CLOCK_MILLIS.to_string()));
}

#[tokio::test]
async fn test_remove_without_matching_refs_leaves_checksum() {
    let h = harness().await;
    let spotify = register(&h, "spotify", ProviderKind::Remote);
    let playlist_id = library_playlist(&h, &spotify, true).await;
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());

    let removed = mutator
        .remove_tracks(&playlist_id, &[track("tidal", "td1")])
        .await
        .unwrap();

    assert!(!removed);
    assert!(spotify.playlist_removes.lock().unwrap().is_empty());
    assert_eq!(checksum(&h, &playlist_id).await.as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_remove_from_universal_playlist_includes_uris() {
    let h = harness().await;
    let files = register(&h, "filesystem", ProviderKind::UriPassthrough);
    let playlist_id = library_playlist(&h, &files, true).await;
    let mutator = PlaylistTrackMutator::new(h.ctx.clone());

    let removed = mutator
        .remove_tracks(&playlist_id, &[track("tidal", "td1")])
        .await
        .unwrap();

    assert!(removed);
    assert_eq!(
        *files.playlist_removes.lock().unwrap(),
        vec![("pl1".to_string(), vec!["tidal://td1".to_string()])]
    );
}
