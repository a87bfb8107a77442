//! Shared test helpers for sync integration tests
//!
//! Provides an in-process fake media server implementing
//! `IMediaServerAdapter`, plus catalog and config setup helpers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use mvidarr_cache::{DatabasePool, SqliteCatalogRepository};
use mvidarr_core::config::{Config, ConfigBuilder};
use mvidarr_core::domain::ServerType;
use mvidarr_core::ports::{
    ConnectionStatus, IMediaServerAdapter, Library, MediaItem, MediaType, PlayHistoryEntry,
    RemoteAlbum, RemoteArtist, RemoteTrack, ScanResult, ServerSyncStatus, UserMetadata,
};

// ============================================================================
// Catalog and config
// ============================================================================

/// Fresh in-memory catalog
pub async fn setup_catalog() -> Arc<SqliteCatalogRepository> {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteCatalogRepository::new(pool.pool().clone()))
}

/// Config builder with the given servers enabled and configured
pub fn configured(servers: &[ServerType]) -> ConfigBuilder {
    servers.iter().fold(ConfigBuilder::new(), |builder, server| {
        builder
            .server_enabled(*server, true)
            .server_url(*server, format!("http://{}.local", server))
            .server_token(*server, "secret")
    })
}

pub fn config_for(servers: &[ServerType]) -> Config {
    configured(servers).build()
}

// ============================================================================
// FakeAdapter
// ============================================================================

/// Pauses `get_libraries` until released, to hold a sync in flight
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

/// In-process media server with scripted responses
pub struct FakeAdapter {
    server: ServerType,
    libraries: Vec<Library>,
    artists: Vec<RemoteArtist>,
    albums: HashMap<String, Vec<RemoteAlbum>>,
    tracks: HashMap<String, Vec<RemoteTrack>>,
    search: Vec<MediaItem>,
    history: Vec<PlayHistoryEntry>,
    fail_libraries: bool,
    panic_libraries: bool,
    delay: Option<Duration>,
    write_delay: Option<Duration>,
    gate: Option<Arc<Gate>>,
    accept_writes: bool,
    /// `(item_id, played, play_count)` for every play status write
    pub writes: Mutex<Vec<(String, bool, Option<u64>)>>,
}

impl FakeAdapter {
    pub fn new(server: ServerType) -> Self {
        Self {
            server,
            libraries: vec![
                Library {
                    id: "lib-music".into(),
                    name: "Music Videos".into(),
                    kind: "musicvideos".into(),
                },
                Library {
                    id: "lib-movies".into(),
                    name: "Movies".into(),
                    kind: "movie".into(),
                },
            ],
            artists: Vec::new(),
            albums: HashMap::new(),
            tracks: HashMap::new(),
            search: Vec::new(),
            history: Vec::new(),
            fail_libraries: false,
            panic_libraries: false,
            delay: None,
            write_delay: None,
            gate: None,
            accept_writes: true,
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_artists(mut self, artists: &[(&str, &str)]) -> Self {
        for (id, name) in artists {
            self.artists.push(RemoteArtist {
                id: id.to_string(),
                name: name.to_string(),
                library_id: Some("lib-music".into()),
            });
        }
        self
    }

    pub fn with_album(mut self, artist_id: &str, album_id: &str, tracks: Vec<RemoteTrack>) -> Self {
        self.albums
            .entry(artist_id.to_string())
            .or_default()
            .push(RemoteAlbum {
                id: album_id.to_string(),
                name: format!("Album {album_id}"),
                year: None,
            });
        self.tracks.insert(album_id.to_string(), tracks);
        self
    }

    pub fn with_search(mut self, items: Vec<MediaItem>) -> Self {
        self.search = items;
        self
    }

    pub fn with_history(mut self, entries: &[(&str, DateTime<Utc>)]) -> Self {
        for (item_id, played_at) in entries {
            self.history.push(PlayHistoryEntry {
                server_type: self.server,
                item_id: item_id.to_string(),
                title: format!("Track {item_id}"),
                artist: None,
                user: Some("alice".into()),
                played_at: *played_at,
            });
        }
        self
    }

    pub fn failing_libraries(mut self) -> Self {
        self.fail_libraries = true;
        self
    }

    pub fn panicking_libraries(mut self) -> Self {
        self.panic_libraries = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delays every play status write after recording it
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn rejecting_writes(mut self) -> Self {
        self.accept_writes = false;
        self
    }

    pub fn recorded_writes(&self) -> Vec<(String, bool, Option<u64>)> {
        self.writes.lock().unwrap().clone()
    }
}

/// A track carrying per-user metadata
pub fn track(id: &str, title: &str, artist: &str, metadata: UserMetadata) -> RemoteTrack {
    RemoteTrack {
        id: id.into(),
        title: title.into(),
        artist: Some(artist.into()),
        album: None,
        year: None,
        duration_secs: None,
        user_metadata: metadata,
    }
}

pub fn search_hit(id: &str, title: &str, media_type: MediaType, artist: Option<&str>) -> MediaItem {
    MediaItem {
        id: id.into(),
        title: title.into(),
        media_type,
        artist: artist.map(String::from),
        album: None,
        year: None,
        duration_secs: None,
    }
}

#[async_trait::async_trait]
impl IMediaServerAdapter for FakeAdapter {
    fn server_type(&self) -> ServerType {
        self.server
    }

    async fn authenticate(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn test_connection(&self) -> anyhow::Result<ConnectionStatus> {
        Ok(ConnectionStatus {
            connected: true,
            server_name: Some(format!("fake {}", self.server)),
            version: Some("1.0".into()),
            error: None,
        })
    }

    async fn get_libraries(&self) -> anyhow::Result<Vec<Library>> {
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_libraries {
            panic!("driver bug");
        }
        if self.fail_libraries {
            anyhow::bail!("connection refused");
        }
        Ok(self.libraries.clone())
    }

    async fn get_artists(&self, library_id: Option<&str>) -> anyhow::Result<Vec<RemoteArtist>> {
        Ok(self
            .artists
            .iter()
            .filter(|a| library_id.is_none() || a.library_id.as_deref() == library_id)
            .cloned()
            .collect())
    }

    async fn get_artist_albums(&self, artist_id: &str) -> anyhow::Result<Vec<RemoteAlbum>> {
        Ok(self.albums.get(artist_id).cloned().unwrap_or_default())
    }

    async fn get_album_tracks(&self, album_id: &str) -> anyhow::Result<Vec<RemoteTrack>> {
        Ok(self.tracks.get(album_id).cloned().unwrap_or_default())
    }

    async fn search_media(
        &self,
        _query: &str,
        media_type: Option<MediaType>,
    ) -> anyhow::Result<Vec<MediaItem>> {
        Ok(self
            .search
            .iter()
            .filter(|item| media_type.map_or(true, |t| t == item.media_type))
            .cloned()
            .collect())
    }

    async fn get_recently_played(&self, limit: usize) -> anyhow::Result<Vec<PlayHistoryEntry>> {
        Ok(self.history.iter().take(limit).cloned().collect())
    }

    async fn get_play_history(
        &self,
        _user_id: Option<&str>,
        limit: usize,
    ) -> anyhow::Result<Vec<PlayHistoryEntry>> {
        Ok(self.history.iter().take(limit).cloned().collect())
    }

    async fn update_play_status(
        &self,
        item_id: &str,
        played: bool,
        play_count: Option<u64>,
    ) -> anyhow::Result<bool> {
        self.writes
            .lock()
            .unwrap()
            .push((item_id.to_string(), played, play_count));
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.accept_writes)
    }

    async fn scan_library(&self, _library_id: Option<&str>) -> anyhow::Result<ScanResult> {
        Ok(ScanResult {
            success: true,
            message: format!("{} scan started", self.server),
        })
    }

    async fn get_sync_status(&self) -> anyhow::Result<ServerSyncStatus> {
        Ok(ServerSyncStatus::default())
    }
}
