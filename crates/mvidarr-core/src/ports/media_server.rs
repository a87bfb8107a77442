//! Media server adapter port (driven/secondary port)
//!
//! This module defines the uniform capability surface every media server
//! driver (Plex, Jellyfin, Emby) exposes to the sync core. Drivers speak
//! their vendor's wire protocol; the sync engine and orchestrator only ever
//! see this trait.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport and vendor errors are
//!   adapter-specific and are folded into sync results as strings anyway.
//! - The structs below are port-level DTOs with the lifetime of one sync
//!   pass; they are never persisted directly.
//! - Item identifiers are the vendor's own opaque strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::field::{FieldValue, SyncField};
use crate::domain::newtypes::ServerType;

// ============================================================================
// Connection and libraries
// ============================================================================

/// Result of a connectivity probe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub server_name: Option<String>,
    pub version: Option<String>,
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// A failed probe carrying the error text
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// A library (section) on a media server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub id: String,
    pub name: String,
    /// Vendor library type, e.g. "artist", "music", "musicvideos", "movie"
    pub kind: String,
}

impl Library {
    /// Whether the library holds music or music videos
    pub fn is_music(&self) -> bool {
        matches!(
            self.kind.to_ascii_lowercase().as_str(),
            "music" | "artist" | "audio" | "musicvideos" | "music_videos"
        )
    }
}

// ============================================================================
// Catalog items
// ============================================================================

/// An artist as reported by a media server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtist {
    pub id: String,
    pub name: String,
    pub library_id: Option<String>,
}

/// An album as reported by a media server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub id: String,
    pub name: String,
    pub year: Option<i32>,
}

/// Per-user metadata a media server tracks for one item
///
/// Every field is optional: vendors differ in what they record, and a
/// missing value is never treated as a difference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub play_count: Option<u64>,
    pub last_played: Option<DateTime<Utc>>,
    pub rating: Option<f64>,
    pub favorite: Option<bool>,
    pub watched: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    /// When the server last changed any of the above
    pub last_modified: Option<DateTime<Utc>>,
}

impl UserMetadata {
    /// Reads one syncable field, or `None` when the server did not report it
    pub fn field_value(&self, field: SyncField) -> Option<FieldValue> {
        match field {
            SyncField::PlayCount => self.play_count.map(FieldValue::Count),
            SyncField::LastPlayed => self.last_played.map(FieldValue::Timestamp),
            SyncField::Rating => self.rating.map(FieldValue::Rating),
            SyncField::Favorite => self.favorite.map(FieldValue::Flag),
            SyncField::WatchedStatus => self.watched.map(FieldValue::Flag),
            SyncField::Tags => self.tags.clone().map(FieldValue::Tags),
            SyncField::Notes => self.notes.clone().map(FieldValue::Text),
        }
    }
}

/// A track or music video as reported by a media server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub duration_secs: Option<u32>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// What kind of item a search should return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Artist,
    Album,
    Track,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MediaType::Artist => "artist",
            MediaType::Album => "album",
            MediaType::Track => "track",
        };
        write!(f, "{}", s)
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub media_type: MediaType,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub duration_secs: Option<u32>,
}

// ============================================================================
// Play history and scans
// ============================================================================

/// One playback event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayHistoryEntry {
    pub server_type: ServerType,
    pub item_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub user: Option<String>,
    pub played_at: DateTime<Utc>,
}

/// Outcome of a library scan request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub success: bool,
    pub message: String,
}

/// A scan or refresh task running on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanActivity {
    pub library_id: Option<String>,
    pub title: String,
    /// Completion in percent, when the server reports it
    pub progress: Option<f32>,
}

/// Scan activity snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSyncStatus {
    pub has_active_scans: bool,
    pub recent_activities: Vec<ScanActivity>,
}

// ============================================================================
// IMediaServerAdapter trait
// ============================================================================

/// Port trait for one media server vendor
///
/// One implementation exists per vendor. The orchestrator holds adapters as
/// `Arc<dyn IMediaServerAdapter>` and never depends on concrete types.
///
/// ## Implementation Notes
///
/// - Calls may block on the network; callers wrap each one in a timeout.
/// - Write operations return `Ok(false)` when the vendor does not support
///   the write, and `Err` only when the request itself failed.
#[async_trait::async_trait]
pub trait IMediaServerAdapter: Send + Sync {
    /// Which vendor this adapter speaks to
    fn server_type(&self) -> ServerType;

    /// Authenticates with the configured credentials
    async fn authenticate(&self) -> anyhow::Result<bool>;

    /// Probes the server and reports its identity
    async fn test_connection(&self) -> anyhow::Result<ConnectionStatus>;

    /// Lists every library on the server
    async fn get_libraries(&self) -> anyhow::Result<Vec<Library>>;

    /// Lists the libraries that hold music or music videos
    async fn get_music_libraries(&self) -> anyhow::Result<Vec<Library>> {
        let libraries = self.get_libraries().await?;
        Ok(libraries.into_iter().filter(Library::is_music).collect())
    }

    /// Lists artists, optionally restricted to one library
    async fn get_artists(&self, library_id: Option<&str>) -> anyhow::Result<Vec<RemoteArtist>>;

    /// Lists the albums of one artist
    async fn get_artist_albums(&self, artist_id: &str) -> anyhow::Result<Vec<RemoteAlbum>>;

    /// Lists the tracks of one album, with per-user metadata
    async fn get_album_tracks(&self, album_id: &str) -> anyhow::Result<Vec<RemoteTrack>>;

    /// Free-text search
    async fn search_media(
        &self,
        query: &str,
        media_type: Option<MediaType>,
    ) -> anyhow::Result<Vec<MediaItem>>;

    /// Most recent playback events across all users
    async fn get_recently_played(&self, limit: usize) -> anyhow::Result<Vec<PlayHistoryEntry>>;

    /// Playback history, optionally for one user
    async fn get_play_history(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> anyhow::Result<Vec<PlayHistoryEntry>>;

    /// Marks an item played or unplayed and optionally sets its play count
    async fn update_play_status(
        &self,
        item_id: &str,
        played: bool,
        play_count: Option<u64>,
    ) -> anyhow::Result<bool>;

    /// Requests a library rescan (all libraries when `None`)
    async fn scan_library(&self, library_id: Option<&str>) -> anyhow::Result<ScanResult>;

    /// Reports running scan activity
    async fn get_sync_status(&self) -> anyhow::Result<ServerSyncStatus>;

    /// Writes one syncable field to an item
    ///
    /// The default maps play count and watched status onto
    /// [`update_play_status`](Self::update_play_status) and reports `false`
    /// for everything else. Drivers override it for the fields their vendor
    /// API can set.
    async fn write_field(
        &self,
        item_id: &str,
        field: SyncField,
        value: &FieldValue,
    ) -> anyhow::Result<bool> {
        match (field, value) {
            (SyncField::PlayCount, FieldValue::Count(count)) => {
                self.update_play_status(item_id, *count > 0, Some(*count))
                    .await
            }
            (SyncField::WatchedStatus, FieldValue::Flag(watched)) => {
                self.update_play_status(item_id, *watched, None).await
            }
            _ => Ok(false),
        }
    }
}
