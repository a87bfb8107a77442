//! Integration tests for multi-server orchestration
//!
//! Verifies candidate selection, the three execution strategies, the
//! single-flight guard, failure isolation, auto-sync scheduling and the
//! status, scan, history and manual-conflict entry points.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use mvidarr_cache::SqliteCatalogRepository;
use mvidarr_core::config::{Config, ConfigBuilder};
use mvidarr_core::domain::{
    CatalogArtist, CatalogVideo, FieldValue, ManualDecision, ServerType, SyncDirection, SyncField,
    SyncStrategy,
};
use mvidarr_core::ports::{ICatalogRepository, UserMetadata};
use mvidarr_sync::SyncOrchestrator;

use crate::common::{self, FakeAdapter, Gate};

fn orchestrator(config: Config, catalog: &Arc<SqliteCatalogRepository>) -> SyncOrchestrator {
    SyncOrchestrator::new(config, catalog.clone(), catalog.clone())
}

fn all_servers() -> ConfigBuilder {
    common::configured(&ServerType::ALL)
}

/// Plex, Jellyfin and Emby with overlapping artist lists; four distinct names
fn register_overlapping(orch: &SyncOrchestrator) {
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Plex).with_artists(&[("p1", "Daft Punk"), ("p2", "Air")]),
    ));
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Jellyfin).with_artists(&[("j1", "Air"), ("j2", "Justice")]),
    ));
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Emby).with_artists(&[("e1", "Moby")]),
    ));
}

fn order_of(results: &[mvidarr_core::domain::SyncResult]) -> Vec<ServerType> {
    results.iter().map(|r| r.server_type).collect()
}

// ============================================================================
// Candidates and status
// ============================================================================

#[tokio::test]
async fn test_candidates_require_enabled_and_configured() {
    let catalog = common::setup_catalog().await;
    let config = common::configured(&[ServerType::Plex, ServerType::Jellyfin])
        .server_enabled(ServerType::Emby, true)
        .build();
    let orch = orchestrator(config, &catalog);

    assert_eq!(
        orch.candidate_servers(None),
        vec![ServerType::Plex, ServerType::Jellyfin]
    );
    assert_eq!(
        orch.candidate_servers(Some(ServerType::Jellyfin)),
        vec![ServerType::Jellyfin]
    );
    assert!(orch.candidate_servers(Some(ServerType::Emby)).is_empty());
}

#[tokio::test]
async fn test_status_reports_each_server() {
    let catalog = common::setup_catalog().await;
    let config = common::configured(&[ServerType::Plex, ServerType::Jellyfin])
        .server_enabled(ServerType::Emby, true)
        .build();
    let orch = orchestrator(config, &catalog);
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Plex)));

    let status = orch.status().await;

    assert!(!status.in_progress);
    assert!(status.last_full_sync.is_none());
    assert!(!status.auto_sync_enabled);
    assert!(status.next_auto_sync_due.is_none());
    assert_eq!(status.pending_manual_conflicts, 0);
    assert_eq!(status.adapters.len(), 3);

    let plex = &status.adapters[0];
    assert_eq!(plex.server_type, ServerType::Plex);
    assert!(plex.enabled && plex.configured && plex.registered && plex.connected);
    assert_eq!(plex.server_name.as_deref(), Some("fake plex"));

    let jellyfin = &status.adapters[1];
    assert!(jellyfin.configured);
    assert!(!jellyfin.registered);
    assert!(!jellyfin.connected);

    let emby = &status.adapters[2];
    assert!(emby.enabled);
    assert!(!emby.configured);
}

#[tokio::test]
async fn test_disabled_server_is_never_synced() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(common::config_for(&[ServerType::Plex]), &catalog);
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Plex).with_artists(&[("p1", "Air")]),
    ));
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Emby).with_artists(&[("e1", "Moby")]),
    ));

    let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;

    assert!(aggregate.success);
    assert_eq!(order_of(&aggregate.results), vec![ServerType::Plex]);
    assert_eq!(catalog.list_artists().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_candidate_without_driver_reports_error() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(
        common::config_for(&[ServerType::Plex, ServerType::Jellyfin]),
        &catalog,
    );
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Plex).with_artists(&[("p1", "Air")]),
    ));

    let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;

    assert!(!aggregate.success);
    assert!(aggregate.result_for(ServerType::Plex).unwrap().is_success());
    let jellyfin = aggregate.result_for(ServerType::Jellyfin).unwrap();
    assert_eq!(jellyfin.errors, vec!["No adapter registered for jellyfin".to_string()]);
    assert_eq!(aggregate.errors, vec!["jellyfin: No adapter registered for jellyfin".to_string()]);
}

// ============================================================================
// Strategies
// ============================================================================

#[tokio::test]
async fn test_strategies_produce_equal_totals() {
    for strategy in ["sequential", "parallel", "priority"] {
        let catalog = common::setup_catalog().await;
        let orch = orchestrator(all_servers().sync_strategy(strategy).build(), &catalog);
        register_overlapping(&orch);

        let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;

        assert!(aggregate.success, "{strategy}: {:?}", aggregate.errors);
        assert_eq!(aggregate.results.len(), 3, "{strategy}");
        assert_eq!(aggregate.totals.items_processed, 5, "{strategy}");
        assert_eq!(aggregate.totals.new_entities_created, 4, "{strategy}");

        let artists = catalog.list_artists().await.unwrap();
        assert_eq!(artists.len(), 4, "{strategy}");
        let air = artists.iter().find(|a| a.name() == "Air").unwrap();
        assert_eq!(air.external_id(ServerType::Plex).unwrap().as_str(), "p2");
        assert_eq!(air.external_id(ServerType::Jellyfin).unwrap().as_str(), "j1");
    }
}

#[tokio::test]
async fn test_sequential_follows_registration_order() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(all_servers().build(), &catalog);
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Emby)));
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Plex)));
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Jellyfin)));

    let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;

    assert_eq!(aggregate.strategy, Some(SyncStrategy::Sequential));
    assert_eq!(
        order_of(&aggregate.results),
        vec![ServerType::Emby, ServerType::Plex, ServerType::Jellyfin]
    );
}

#[tokio::test]
async fn test_priority_follows_configured_order() {
    let catalog = common::setup_catalog().await;
    let config = all_servers()
        .sync_strategy("priority")
        .sync_priority_order(&[ServerType::Jellyfin, ServerType::Emby])
        .build();
    let orch = orchestrator(config, &catalog);
    for server in ServerType::ALL {
        orch.register_adapter(Arc::new(FakeAdapter::new(server)));
    }

    let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;

    assert_eq!(aggregate.strategy, Some(SyncStrategy::Priority));
    assert_eq!(
        order_of(&aggregate.results),
        vec![ServerType::Jellyfin, ServerType::Emby, ServerType::Plex]
    );
}

#[tokio::test]
async fn test_parallel_isolates_a_panicking_adapter() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(
        common::configured(&[ServerType::Plex, ServerType::Jellyfin])
            .sync_strategy("parallel")
            .build(),
        &catalog,
    );
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Plex).panicking_libraries(),
    ));
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Jellyfin).with_artists(&[("j1", "Justice")]),
    ));

    let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;

    assert!(!aggregate.success);
    let plex = aggregate.result_for(ServerType::Plex).unwrap();
    assert_eq!(plex.errors.len(), 1);
    assert!(plex.errors[0].starts_with("Sync task failed"));

    let jellyfin = aggregate.result_for(ServerType::Jellyfin).unwrap();
    assert!(jellyfin.is_success());
    assert_eq!(jellyfin.new_entities_created, 1);
    assert!(!orch.is_in_progress());
}

#[tokio::test]
async fn test_failing_server_does_not_block_others() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(all_servers().build(), &catalog);
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Plex).with_artists(&[("p1", "Air")]),
    ));
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Jellyfin).failing_libraries(),
    ));
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Emby).with_artists(&[("e1", "Moby")]),
    ));

    let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;

    assert!(!aggregate.success);
    assert_eq!(aggregate.totals.new_entities_created, 2);
    assert_eq!(aggregate.totals.errors, 1);
    assert!(aggregate.errors[0].starts_with("jellyfin: "));
}

#[tokio::test]
async fn test_slow_adapter_times_out() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(
        common::configured(&[ServerType::Emby])
            .adapter_timeout_secs(1)
            .build(),
        &catalog,
    );
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Emby).with_delay(Duration::from_secs(3)),
    ));

    let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;

    let emby = aggregate.result_for(ServerType::Emby).unwrap();
    assert_eq!(emby.errors.len(), 1);
    assert!(emby.errors[0].contains("timed out after 1s"), "{}", emby.errors[0]);
}

// ============================================================================
// Single flight and scheduling
// ============================================================================

#[tokio::test]
async fn test_second_sync_while_running_is_rejected() {
    let catalog = common::setup_catalog().await;
    let orch = Arc::new(orchestrator(common::config_for(&[ServerType::Plex]), &catalog));
    let gate = Arc::new(Gate::default());
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Plex)
            .with_artists(&[("p1", "Air")])
            .with_gate(gate.clone()),
    ));

    let running = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.sync_all(SyncDirection::FromServer, None).await })
    };
    gate.started.notified().await;

    assert!(orch.is_in_progress());
    let busy = orch.sync_all(SyncDirection::FromServer, None).await;
    assert!(busy.sync_in_progress);
    assert!(!busy.success);
    assert!(busy.results.is_empty());
    assert!(busy.errors.is_empty());

    let single = orch
        .sync_adapter(ServerType::Plex, SyncDirection::FromServer)
        .await;
    assert!(single.sync_in_progress);
    assert!(!orch.should_auto_sync(Utc::now()));

    gate.release.notify_one();
    let finished = running.await.unwrap();
    assert!(finished.success);
    assert!(!finished.sync_in_progress);
    assert!(!orch.is_in_progress());
}

#[tokio::test]
async fn test_auto_sync_due_after_interval() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(
        common::configured(&[ServerType::Plex]).auto_sync(true, 60).build(),
        &catalog,
    );
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Plex)));

    assert!(orch.should_auto_sync(Utc::now()));

    orch.sync_all(SyncDirection::FromServer, None).await;
    let last = orch.last_full_sync().unwrap();

    assert!(!orch.should_auto_sync(last + chrono::Duration::minutes(59)));
    assert!(orch.should_auto_sync(last + chrono::Duration::minutes(60)));

    let status = orch.status().await;
    assert_eq!(status.next_auto_sync_due, Some(last + chrono::Duration::minutes(60)));
}

#[tokio::test]
async fn test_auto_sync_disabled() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(common::config_for(&[ServerType::Plex]), &catalog);
    assert!(!orch.should_auto_sync(Utc::now()));
}

#[tokio::test]
async fn test_filtered_sync_does_not_count_as_full() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(all_servers().auto_sync(true, 30).build(), &catalog);
    register_overlapping(&orch);

    let filtered = orch
        .sync_all(SyncDirection::FromServer, Some(ServerType::Jellyfin))
        .await;
    assert_eq!(order_of(&filtered.results), vec![ServerType::Jellyfin]);
    assert!(orch.last_full_sync().is_none());

    orch.sync_adapter(ServerType::Emby, SyncDirection::FromServer)
        .await;
    assert!(orch.last_full_sync().is_none());
    assert!(orch.should_auto_sync(Utc::now()));
}

#[tokio::test]
async fn test_sync_adapter_rejects_non_candidate() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(common::config_for(&[ServerType::Plex]), &catalog);
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Emby)));

    let aggregate = orch
        .sync_adapter(ServerType::Emby, SyncDirection::FromServer)
        .await;

    assert!(!aggregate.success);
    let emby = aggregate.result_for(ServerType::Emby).unwrap();
    assert!(emby.errors[0].contains("not enabled and configured"));
}

#[tokio::test]
async fn test_register_same_server_replaces_driver() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(common::config_for(&[ServerType::Plex]), &catalog);
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Plex).failing_libraries()));
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Plex).with_artists(&[("p1", "Air")]),
    ));

    assert_eq!(orch.registered().len(), 1);
    let aggregate = orch.sync_all(SyncDirection::FromServer, None).await;
    assert!(aggregate.success);
    assert_eq!(aggregate.totals.new_entities_created, 1);
}

// ============================================================================
// Scans, history and manual conflicts
// ============================================================================

#[tokio::test]
async fn test_library_scans_cover_candidates() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(
        common::config_for(&[ServerType::Plex, ServerType::Jellyfin]),
        &catalog,
    );
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Plex)));

    let outcomes = orch.trigger_library_scans(None).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].server_type, ServerType::Plex);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].message, "plex scan started");
    assert_eq!(outcomes[1].server_type, ServerType::Jellyfin);
    assert!(!outcomes[1].success);

    let only_plex = orch.trigger_library_scans(Some(ServerType::Plex)).await;
    assert_eq!(only_plex.len(), 1);
}

#[tokio::test]
async fn test_combined_play_history_is_newest_first() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(
        common::config_for(&[ServerType::Plex, ServerType::Jellyfin]),
        &catalog,
    );
    let now = Utc::now();
    orch.register_adapter(Arc::new(FakeAdapter::new(ServerType::Plex).with_history(&[
        ("p-1", now - chrono::Duration::minutes(10)),
        ("p-2", now - chrono::Duration::minutes(30)),
    ])));
    orch.register_adapter(Arc::new(
        FakeAdapter::new(ServerType::Jellyfin)
            .with_history(&[("j-1", now - chrono::Duration::minutes(20))]),
    ));

    let all = orch.combined_play_history(10).await;
    let ids: Vec<&str> = all.iter().map(|e| e.item_id.as_str()).collect();
    assert_eq!(ids, vec!["p-1", "j-1", "p-2"]);
    assert_eq!(all[1].server_type, ServerType::Jellyfin);

    let top = orch.combined_play_history(2).await;
    assert_eq!(top.len(), 2);
    assert_eq!(top[1].item_id, "j-1");
}

#[tokio::test]
async fn test_manual_conflict_round_trip() {
    let catalog = common::setup_catalog().await;
    let artist = CatalogArtist::new("Daft Punk");
    catalog.save_artist(&artist).await.unwrap();
    let mut video = CatalogVideo::new(*artist.id(), "Around the World");
    video
        .apply_field(SyncField::PlayCount, FieldValue::Count(3))
        .unwrap();
    catalog.save_video(&video).await.unwrap();

    // default policy is manual review
    let orch = orchestrator(common::config_for(&[ServerType::Plex]), &catalog);
    let plex = Arc::new(
        FakeAdapter::new(ServerType::Plex)
            .with_artists(&[("p1", "Daft Punk")])
            .with_album(
                "p1",
                "homework",
                vec![common::track(
                    "t-atw",
                    "Around the World",
                    "Daft Punk",
                    UserMetadata {
                        play_count: Some(9),
                        ..UserMetadata::default()
                    },
                )],
            ),
    );
    orch.register_adapter(plex.clone());

    let aggregate = orch.sync_all(SyncDirection::Bidirectional, None).await;
    assert!(aggregate.success, "{:?}", aggregate.errors);
    assert_eq!(aggregate.totals.manual_conflicts, 1);
    assert_eq!(orch.status().await.pending_manual_conflicts, 1);

    let pending = orch.list_manual_conflicts().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].external_value(), Some(&FieldValue::Count(9)));

    orch.resolve_manual_conflict(pending[0].id(), ManualDecision::KeepInternal)
        .await
        .unwrap();

    assert_eq!(
        plex.recorded_writes(),
        vec![("t-atw".to_string(), true, Some(3))]
    );
    assert!(orch.list_manual_conflicts().await.unwrap().is_empty());
    let stored = catalog.get_video(video.id()).await.unwrap().unwrap();
    assert_eq!(stored.play_count(), 3);
}

#[tokio::test]
async fn test_keep_internal_write_is_bounded_by_adapter_timeout() {
    let catalog = common::setup_catalog().await;
    let artist = CatalogArtist::new("Moby");
    catalog.save_artist(&artist).await.unwrap();
    let mut video = CatalogVideo::new(*artist.id(), "Porcelain");
    video
        .apply_field(SyncField::PlayCount, FieldValue::Count(4))
        .unwrap();
    catalog.save_video(&video).await.unwrap();

    let orch = orchestrator(
        common::configured(&[ServerType::Emby])
            .adapter_timeout_secs(1)
            .build(),
        &catalog,
    );
    let emby = Arc::new(
        FakeAdapter::new(ServerType::Emby)
            .with_artists(&[("e-m", "Moby")])
            .with_album(
                "e-m",
                "play",
                vec![common::track(
                    "e-porc",
                    "Porcelain",
                    "Moby",
                    UserMetadata {
                        play_count: Some(1),
                        ..UserMetadata::default()
                    },
                )],
            )
            .with_write_delay(Duration::from_secs(3)),
    );
    orch.register_adapter(emby.clone());

    let aggregate = orch.sync_all(SyncDirection::Bidirectional, None).await;
    assert!(aggregate.success, "{:?}", aggregate.errors);
    let pending = orch.list_manual_conflicts().await.unwrap();
    assert_eq!(pending.len(), 1);

    let started = std::time::Instant::now();
    let err = orch
        .resolve_manual_conflict(pending[0].id(), ManualDecision::KeepInternal)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3));
    match err {
        mvidarr_conflict::ConflictError::ResolutionFailed(msg) => {
            assert!(msg.contains("timed out after 1s"), "{}", msg)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(emby.recorded_writes().len(), 1);
    assert_eq!(orch.list_manual_conflicts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resolve_unknown_conflict_fails() {
    let catalog = common::setup_catalog().await;
    let orch = orchestrator(common::config_for(&[ServerType::Plex]), &catalog);

    let missing = mvidarr_core::domain::ConflictId::new();
    let err = orch
        .resolve_manual_conflict(&missing, ManualDecision::KeepExternal)
        .await
        .unwrap_err();
    assert!(matches!(err, mvidarr_conflict::ConflictError::NotFound(_)));
}
