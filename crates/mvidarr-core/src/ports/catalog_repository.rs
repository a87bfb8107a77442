//! Catalog repository port (driven/secondary port)
//!
//! This module defines the interface for persisting and querying the
//! internal catalog of artists and videos.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Sync workers running in parallel share one repository. Writes are
//!   restricted to creating new rows ([`insert_artist_if_absent`]) and
//!   single idempotent field updates on existing rows
//!   ([`attach_artist_external_id`], [`update_video_field`]), so two
//!   workers can never clobber each other's contribution.
//!
//! [`insert_artist_if_absent`]: ICatalogRepository::insert_artist_if_absent
//! [`attach_artist_external_id`]: ICatalogRepository::attach_artist_external_id
//! [`update_video_field`]: ICatalogRepository::update_video_field

use crate::domain::{
    field::{FieldValue, SyncField},
    newtypes::{ArtistId, ExternalId, ServerType, VideoId},
    CatalogArtist, CatalogVideo,
};

/// Outcome of [`ICatalogRepository::insert_artist_if_absent`]
#[derive(Debug, Clone, PartialEq)]
pub enum ArtistInsert {
    /// The artist was stored as given
    Created,
    /// An artist with the same normalized name already existed
    Existing(CatalogArtist),
}

/// Port trait for catalog storage
#[async_trait::async_trait]
pub trait ICatalogRepository: Send + Sync {
    // --- Artist operations ---

    /// Inserts or replaces an artist row and its external ids
    async fn save_artist(&self, artist: &CatalogArtist) -> anyhow::Result<()>;

    /// Retrieves an artist by id
    async fn get_artist(&self, id: &ArtistId) -> anyhow::Result<Option<CatalogArtist>>;

    /// Lists all artists ordered by name
    async fn list_artists(&self) -> anyhow::Result<Vec<CatalogArtist>>;

    /// Finds the artist linked to a server item
    async fn find_artist_by_external_id(
        &self,
        server: ServerType,
        external_id: &ExternalId,
    ) -> anyhow::Result<Option<CatalogArtist>>;

    /// Stores the artist unless one with the same normalized name exists
    async fn insert_artist_if_absent(&self, artist: &CatalogArtist)
        -> anyhow::Result<ArtistInsert>;

    /// Sets the artist's id for `server` only if none is set
    ///
    /// Returns `true` when the id was written.
    async fn attach_artist_external_id(
        &self,
        id: &ArtistId,
        server: ServerType,
        external_id: &ExternalId,
    ) -> anyhow::Result<bool>;

    // --- Video operations ---

    /// Inserts or replaces a video row and its external ids
    async fn save_video(&self, video: &CatalogVideo) -> anyhow::Result<()>;

    /// Retrieves a video by id
    async fn get_video(&self, id: &VideoId) -> anyhow::Result<Option<CatalogVideo>>;

    /// Lists the videos of one artist
    async fn list_videos_by_artist(&self, artist_id: &ArtistId)
        -> anyhow::Result<Vec<CatalogVideo>>;

    /// Finds the video linked to a server item
    async fn find_video_by_external_id(
        &self,
        server: ServerType,
        external_id: &ExternalId,
    ) -> anyhow::Result<Option<CatalogVideo>>;

    /// Sets the video's id for `server` only if none is set
    ///
    /// Returns `true` when the id was written.
    async fn attach_video_external_id(
        &self,
        id: &VideoId,
        server: ServerType,
        external_id: &ExternalId,
    ) -> anyhow::Result<bool>;

    /// Writes a single syncable field and bumps `updated_at`
    ///
    /// Fails when the video does not exist or the value kind does not fit.
    async fn update_video_field(
        &self,
        id: &VideoId,
        field: SyncField,
        value: &FieldValue,
    ) -> anyhow::Result<()>;
}
