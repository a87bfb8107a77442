//! Integration tests for single-server sync runs
//!
//! Covers artist matching and creation, id backfill, per-item error
//! isolation, field reconciliation and server-side linking.

use mvidarr_core::domain::{
    CatalogArtist, CatalogVideo, ConflictReason, ExternalId, FieldValue, ServerType,
    SyncDirection, SyncField,
};
use mvidarr_core::ports::{ICatalogRepository, IConflictQueue, MediaType, UserMetadata};
use mvidarr_sync::SyncEngine;

use crate::common::{self, FakeAdapter};

fn engine_for(
    catalog: &std::sync::Arc<mvidarr_cache::SqliteCatalogRepository>,
    builder: mvidarr_core::config::ConfigBuilder,
) -> SyncEngine {
    let config = builder.build();
    SyncEngine::from_config(catalog.clone(), catalog.clone(), &config)
}

/// Saves an artist with one video carrying a play count and optional rating
async fn seed_video(
    catalog: &mvidarr_cache::SqliteCatalogRepository,
    artist_name: &str,
    title: &str,
    play_count: u64,
    rating: Option<f64>,
) -> (CatalogArtist, CatalogVideo) {
    let artist = CatalogArtist::new(artist_name);
    catalog.save_artist(&artist).await.unwrap();

    let mut video = CatalogVideo::new(*artist.id(), title);
    video
        .apply_field(SyncField::PlayCount, FieldValue::Count(play_count))
        .unwrap();
    if let Some(r) = rating {
        video.apply_field(SyncField::Rating, FieldValue::Rating(r)).unwrap();
    }
    catalog.save_video(&video).await.unwrap();
    (artist, video)
}

// ============================================================================
// Pull
// ============================================================================

#[tokio::test]
async fn test_from_server_creates_artists_once() {
    let catalog = common::setup_catalog().await;
    let engine = engine_for(&catalog, common::configured(&[ServerType::Plex]));
    let plex = FakeAdapter::new(ServerType::Plex).with_artists(&[("p1", "Daft Punk"), ("p2", "Air")]);

    let first = engine.run(&plex, SyncDirection::FromServer, None).await;
    assert!(first.is_success(), "errors: {:?}", first.errors);
    assert_eq!(first.items_processed, 2);
    assert_eq!(first.new_entities_created, 2);

    let second = engine.run(&plex, SyncDirection::FromServer, None).await;
    assert!(second.is_success());
    assert_eq!(second.items_processed, 2);
    assert_eq!(second.new_entities_created, 0);
    assert_eq!(second.updated_items(), 0);

    let artists = catalog.list_artists().await.unwrap();
    assert_eq!(artists.len(), 2);
    assert!(artists.iter().all(|a| a.external_id(ServerType::Plex).is_some()));
}

#[tokio::test]
async fn test_existing_artist_gets_server_id_backfilled() {
    let catalog = common::setup_catalog().await;
    let artist = CatalogArtist::new("Daft Punk");
    catalog.save_artist(&artist).await.unwrap();

    let engine = engine_for(&catalog, common::configured(&[ServerType::Plex]));
    let plex = FakeAdapter::new(ServerType::Plex).with_artists(&[("p1", "Daft Punk")]);

    let result = engine.run(&plex, SyncDirection::FromServer, None).await;

    assert!(result.is_success());
    assert_eq!(result.new_entities_created, 0);
    assert_eq!(result.updated_items(), 1);

    let stored = catalog.get_artist(artist.id()).await.unwrap().unwrap();
    assert_eq!(stored.external_id(ServerType::Plex).unwrap().as_str(), "p1");
}

#[tokio::test]
async fn test_existing_server_id_is_never_overwritten() {
    let catalog = common::setup_catalog().await;
    let artist =
        CatalogArtist::discovered_on("Daft Punk", ServerType::Plex, ExternalId::new("old").unwrap());
    catalog.save_artist(&artist).await.unwrap();

    let engine = engine_for(&catalog, common::configured(&[ServerType::Plex]));
    let plex = FakeAdapter::new(ServerType::Plex).with_artists(&[("new", "Daft Punk")]);

    let result = engine.run(&plex, SyncDirection::FromServer, None).await;

    assert!(result.is_success());
    assert_eq!(result.new_entities_created, 0);
    assert_eq!(result.updated_items(), 0);

    let stored = catalog.get_artist(artist.id()).await.unwrap().unwrap();
    assert_eq!(stored.external_id(ServerType::Plex).unwrap().as_str(), "old");
}

#[tokio::test]
async fn test_artist_name_substring_matches() {
    let catalog = common::setup_catalog().await;
    catalog
        .save_artist(&CatalogArtist::new("The Chemical Brothers"))
        .await
        .unwrap();

    let engine = engine_for(&catalog, common::configured(&[ServerType::Jellyfin]));
    let jellyfin =
        FakeAdapter::new(ServerType::Jellyfin).with_artists(&[("jf-9", "Chemical Brothers")]);

    let result = engine.run(&jellyfin, SyncDirection::FromServer, None).await;

    assert_eq!(result.new_entities_created, 0);
    assert_eq!(result.updated_items(), 1);
    assert_eq!(catalog.list_artists().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_library_failure_is_single_error() {
    let catalog = common::setup_catalog().await;
    let engine = engine_for(&catalog, common::configured(&[ServerType::Emby]));
    let emby = FakeAdapter::new(ServerType::Emby)
        .with_artists(&[("e1", "Moby")])
        .failing_libraries();

    let result = engine.run(&emby, SyncDirection::FromServer, None).await;

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("connection refused"));
    assert_eq!(result.items_processed, 0);
    assert!(catalog.list_artists().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_item_does_not_stop_the_run() {
    let catalog = common::setup_catalog().await;
    let engine = engine_for(&catalog, common::configured(&[ServerType::Plex]));
    let plex = FakeAdapter::new(ServerType::Plex).with_artists(&[("", "Broken"), ("p2", "Air")]);

    let result = engine.run(&plex, SyncDirection::FromServer, None).await;

    assert_eq!(result.items_processed, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("Broken"));
    assert_eq!(result.new_entities_created, 1);
}

#[tokio::test]
async fn test_unknown_library_filter_fails_the_run() {
    let catalog = common::setup_catalog().await;
    let engine = engine_for(&catalog, common::configured(&[ServerType::Plex]));
    let plex = FakeAdapter::new(ServerType::Plex).with_artists(&[("p1", "Air")]);

    let result = engine
        .run(&plex, SyncDirection::FromServer, Some("Podcasts"))
        .await;
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("Podcasts"));

    let by_name = engine
        .run(&plex, SyncDirection::FromServer, Some("music videos"))
        .await;
    assert!(by_name.is_success());
    assert_eq!(by_name.new_entities_created, 1);
}

// ============================================================================
// Reconcile
// ============================================================================

#[tokio::test]
async fn test_bidirectional_applies_per_field_policies() {
    let catalog = common::setup_catalog().await;
    let (_, video) = seed_video(&catalog, "Daft Punk", "One More Time", 3, Some(4.0)).await;

    let engine = engine_for(
        &catalog,
        common::configured(&[ServerType::Plex])
            .conflicts_default_policy("server_wins")
            .conflicts_field_policy("rating", "manual_review"),
    );
    let plex = FakeAdapter::new(ServerType::Plex)
        .with_artists(&[("p1", "Daft Punk")])
        .with_album(
            "p1",
            "a1",
            vec![common::track(
                "t1",
                "One More Time",
                "Daft Punk",
                UserMetadata {
                    play_count: Some(12),
                    rating: Some(2.0),
                    ..UserMetadata::default()
                },
            )],
        );

    let result = engine.run(&plex, SyncDirection::Bidirectional, None).await;

    assert!(result.is_success(), "errors: {:?}", result.errors);
    assert_eq!(result.conflicts_resolved, 1);
    assert_eq!(result.manual_conflicts.len(), 1);
    assert_eq!(result.manual_conflicts[0].field(), SyncField::Rating);
    // artist id, video id, pulled play count
    assert_eq!(result.updates_from_server, 3);

    let stored = catalog.get_video(video.id()).await.unwrap().unwrap();
    assert_eq!(stored.play_count(), 12);
    assert_eq!(stored.rating(), Some(4.0));
    assert_eq!(stored.external_id(ServerType::Plex).unwrap().as_str(), "t1");
    assert_eq!(catalog.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_mvidarr_wins_pushes_supported_fields() {
    let catalog = common::setup_catalog().await;
    let (_, video) = seed_video(&catalog, "Air", "Sexy Boy", 5, Some(4.0)).await;

    let engine = engine_for(
        &catalog,
        common::configured(&[ServerType::Jellyfin]).conflicts_default_policy("mvidarr_wins"),
    );
    let jellyfin = FakeAdapter::new(ServerType::Jellyfin)
        .with_artists(&[("jf-a", "Air")])
        .with_album(
            "jf-a",
            "jf-moon",
            vec![common::track(
                "jf-t",
                "Sexy Boy",
                "Air",
                UserMetadata {
                    play_count: Some(2),
                    rating: Some(1.0),
                    ..UserMetadata::default()
                },
            )],
        );

    let result = engine
        .run(&jellyfin, SyncDirection::Bidirectional, None)
        .await;

    assert_eq!(
        jellyfin.recorded_writes(),
        vec![("jf-t".to_string(), true, Some(5))]
    );
    assert_eq!(result.updates_to_server, 1);
    assert_eq!(result.conflicts_resolved, 1);

    // the fake cannot write ratings, so the field is re-queued
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.manual_conflicts.len(), 1);
    assert_eq!(result.manual_conflicts[0].field(), SyncField::Rating);

    let stored = catalog.get_video(video.id()).await.unwrap().unwrap();
    assert_eq!(stored.play_count(), 5);
    assert_eq!(stored.rating(), Some(4.0));
}

#[tokio::test]
async fn test_repeated_runs_keep_one_pending_conflict_per_field() {
    let catalog = common::setup_catalog().await;
    seed_video(&catalog, "Daft Punk", "Digital Love", 7, Some(5.0)).await;

    let engine = engine_for(
        &catalog,
        common::configured(&[ServerType::Plex]).conflicts_default_policy("manual_review"),
    );
    let plex = FakeAdapter::new(ServerType::Plex)
        .with_artists(&[("p1", "Daft Punk")])
        .with_album(
            "p1",
            "discovery",
            vec![common::track(
                "t-dl",
                "Digital Love",
                "Daft Punk",
                UserMetadata {
                    play_count: Some(7),
                    rating: Some(3.0),
                    ..UserMetadata::default()
                },
            )],
        );

    let first = engine.run(&plex, SyncDirection::Bidirectional, None).await;
    let pending = catalog.list().await.unwrap();
    assert_eq!(pending.len(), 1);

    for _ in 0..2 {
        let result = engine.run(&plex, SyncDirection::Bidirectional, None).await;
        assert!(result.is_success(), "errors: {:?}", result.errors);
        assert_eq!(result.conflicts_resolved, 0);
        assert_eq!(result.manual_conflicts.len(), 1);
    }

    assert_eq!(first.manual_conflicts.len(), 1);
    assert_eq!(catalog.count().await.unwrap(), 1);
    assert_eq!(catalog.list().await.unwrap()[0].id(), pending[0].id());
}

#[tokio::test]
async fn test_rejected_push_is_requeued_as_apply_failure() {
    let catalog = common::setup_catalog().await;
    let (_, video) = seed_video(&catalog, "Justice", "Genesis", 9, None).await;

    let engine = engine_for(
        &catalog,
        common::configured(&[ServerType::Emby]).conflicts_default_policy("mvidarr_wins"),
    );
    let emby = FakeAdapter::new(ServerType::Emby)
        .with_artists(&[("e-j", "Justice")])
        .with_album(
            "e-j",
            "cross",
            vec![common::track(
                "e-gen",
                "Genesis",
                "Justice",
                UserMetadata {
                    play_count: Some(2),
                    ..UserMetadata::default()
                },
            )],
        )
        .rejecting_writes();

    let result = engine.run(&emby, SyncDirection::Bidirectional, None).await;

    assert_eq!(
        emby.recorded_writes(),
        vec![("e-gen".to_string(), true, Some(9))]
    );
    assert_eq!(result.conflicts_resolved, 0);
    assert_eq!(result.updates_to_server, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.manual_conflicts.len(), 1);

    let queued = catalog.list().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].field(), SyncField::PlayCount);
    assert!(matches!(queued[0].reason(), ConflictReason::ApplyFailed(_)));

    let stored = catalog.get_video(video.id()).await.unwrap().unwrap();
    assert_eq!(stored.play_count(), 9);
}

#[tokio::test]
async fn test_unmatched_track_is_left_alone() {
    let catalog = common::setup_catalog().await;
    let (_, video) = seed_video(&catalog, "Justice", "Genesis", 1, None).await;

    let engine = engine_for(
        &catalog,
        common::configured(&[ServerType::Plex]).conflicts_default_policy("server_wins"),
    );
    let plex = FakeAdapter::new(ServerType::Plex)
        .with_artists(&[("p-j", "Justice")])
        .with_album(
            "p-j",
            "cross",
            vec![common::track(
                "t-dvno",
                "D.A.N.C.E.",
                "Justice",
                UserMetadata {
                    play_count: Some(40),
                    ..UserMetadata::default()
                },
            )],
        );

    let result = engine.run(&plex, SyncDirection::Bidirectional, None).await;

    assert!(result.is_success());
    assert_eq!(result.conflicts_resolved, 0);
    let stored = catalog.get_video(video.id()).await.unwrap().unwrap();
    assert_eq!(stored.play_count(), 1);
    assert!(stored.external_id(ServerType::Plex).is_none());
}

// ============================================================================
// Push
// ============================================================================

#[tokio::test]
async fn test_to_server_links_catalog_entries() {
    let catalog = common::setup_catalog().await;
    let (artist, video) = seed_video(&catalog, "Air", "Sexy Boy", 0, None).await;

    let engine = engine_for(&catalog, common::configured(&[ServerType::Emby]));
    let emby = FakeAdapter::new(ServerType::Emby).with_search(vec![
        common::search_hit("em-air", "Air", MediaType::Artist, None),
        common::search_hit("em-boy", "Sexy Boy", MediaType::Track, Some("Air")),
        common::search_hit("em-other", "Kelly Watch the Stars", MediaType::Track, Some("Air")),
    ]);

    let result = engine.run(&emby, SyncDirection::ToServer, None).await;

    assert!(result.is_success(), "errors: {:?}", result.errors);
    assert_eq!(result.items_processed, 2);
    assert_eq!(result.updates_to_server, 2);
    assert_eq!(result.new_entities_created, 0);

    let stored_artist = catalog.get_artist(artist.id()).await.unwrap().unwrap();
    assert_eq!(
        stored_artist.external_id(ServerType::Emby).unwrap().as_str(),
        "em-air"
    );
    let stored_video = catalog.get_video(video.id()).await.unwrap().unwrap();
    assert_eq!(
        stored_video.external_id(ServerType::Emby).unwrap().as_str(),
        "em-boy"
    );

    let again = engine.run(&emby, SyncDirection::ToServer, None).await;
    assert_eq!(again.items_processed, 0);
    assert_eq!(again.updates_to_server, 0);
}
