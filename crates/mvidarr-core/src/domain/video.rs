//! CatalogVideo domain entity
//!
//! A video belongs to one artist and carries the user metadata that is
//! reconciled with media servers in bidirectional mode.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::field::{FieldValue, SyncField};
use super::newtypes::{ArtistId, ExternalId, ServerType, VideoId};

/// A music video in the internal catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogVideo {
    id: VideoId,
    artist_id: ArtistId,
    title: String,
    album: Option<String>,
    year: Option<i32>,
    duration_secs: Option<u32>,
    play_count: u64,
    last_played: Option<DateTime<Utc>>,
    favorite: bool,
    rating: Option<f64>,
    watched: bool,
    tags: Vec<String>,
    notes: Option<String>,
    /// At most one identifier per media server type
    external_ids: BTreeMap<ServerType, ExternalId>,
    updated_at: DateTime<Utc>,
}

impl CatalogVideo {
    /// Creates an unplayed video for the given artist
    pub fn new(artist_id: ArtistId, title: impl Into<String>) -> Self {
        Self {
            id: VideoId::new(),
            artist_id,
            title: title.into(),
            album: None,
            year: None,
            duration_secs: None,
            play_count: 0,
            last_played: None,
            favorite: false,
            rating: None,
            watched: false,
            tags: Vec::new(),
            notes: None,
            external_ids: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_duration_secs(mut self, duration_secs: u32) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    /// Overrides the last-modified timestamp (used when restoring history)
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn id(&self) -> &VideoId {
        &self.id
    }

    pub fn artist_id(&self) -> &ArtistId {
        &self.artist_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn duration_secs(&self) -> Option<u32> {
        self.duration_secs
    }

    pub fn play_count(&self) -> u64 {
        self.play_count
    }

    pub fn last_played(&self) -> Option<DateTime<Utc>> {
        self.last_played
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite
    }

    pub fn rating(&self) -> Option<f64> {
        self.rating
    }

    pub fn is_watched(&self) -> bool {
        self.watched
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn external_id(&self, server: ServerType) -> Option<&ExternalId> {
        self.external_ids.get(&server)
    }

    pub fn external_ids(&self) -> &BTreeMap<ServerType, ExternalId> {
        &self.external_ids
    }

    /// Links the video to a server item if it is not linked yet
    ///
    /// Returns `true` when the id was recorded.
    pub fn attach_external_id(&mut self, server: ServerType, external_id: ExternalId) -> bool {
        if self.external_ids.contains_key(&server) {
            return false;
        }
        self.external_ids.insert(server, external_id);
        true
    }

    /// Reads the current value of a syncable field
    ///
    /// Returns `None` for optional fields that have never been set.
    pub fn field_value(&self, field: SyncField) -> Option<FieldValue> {
        match field {
            SyncField::PlayCount => Some(FieldValue::Count(self.play_count)),
            SyncField::LastPlayed => self.last_played.map(FieldValue::Timestamp),
            SyncField::Rating => self.rating.map(FieldValue::Rating),
            SyncField::Favorite => Some(FieldValue::Flag(self.favorite)),
            SyncField::WatchedStatus => Some(FieldValue::Flag(self.watched)),
            SyncField::Tags => Some(FieldValue::Tags(self.tags.clone())),
            SyncField::Notes => self.notes.clone().map(FieldValue::Text),
        }
    }

    /// Writes a syncable field
    ///
    /// # Errors
    /// Returns [`DomainError::FieldTypeMismatch`] if the value kind does not
    /// fit the field (e.g. a flag written to `play_count`).
    pub fn apply_field(&mut self, field: SyncField, value: FieldValue) -> Result<(), DomainError> {
        match (field, value) {
            (SyncField::PlayCount, FieldValue::Count(n)) => self.play_count = n,
            (SyncField::LastPlayed, FieldValue::Timestamp(ts)) => self.last_played = Some(ts),
            (SyncField::Rating, FieldValue::Rating(r)) => self.rating = Some(r),
            (SyncField::Favorite, FieldValue::Flag(b)) => self.favorite = b,
            (SyncField::WatchedStatus, FieldValue::Flag(b)) => self.watched = b,
            (SyncField::Tags, FieldValue::Tags(tags)) => self.tags = tags,
            (SyncField::Notes, FieldValue::Text(text)) => self.notes = Some(text),
            (field, value) => {
                return Err(DomainError::FieldTypeMismatch {
                    field: field.to_string(),
                    value_kind: value.kind().to_string(),
                })
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
