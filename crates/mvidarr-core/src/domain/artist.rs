//! CatalogArtist domain entity
//!
//! Artists are the unit the sync engine reconciles against each media
//! server's artist list. An artist may carry one external id per server
//! type; once set, an external id is never overwritten by sync.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ArtistId, ExternalId, ServerType};

/// An artist in the internal catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogArtist {
    /// Unique identifier
    id: ArtistId,
    /// Display name as stored in the catalog
    name: String,
    /// Whether MVidarr actively tracks new videos for this artist
    monitored: bool,
    /// At most one identifier per media server type
    external_ids: BTreeMap<ServerType, ExternalId>,
    /// Free-form metadata (genres, source, thumbnails...)
    metadata: serde_json::Value,
    /// When the artist was added to the catalog
    created_at: DateTime<Utc>,
    /// When the artist row last changed
    updated_at: DateTime<Utc>,
}

impl CatalogArtist {
    /// Creates a new monitored artist with no external ids
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ArtistId::new(),
            name: name.into(),
            monitored: true,
            external_ids: BTreeMap::new(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an artist discovered on a media server
    ///
    /// The artist starts monitored and already linked to the reporting server.
    pub fn discovered_on(name: impl Into<String>, server: ServerType, external_id: ExternalId) -> Self {
        let mut artist = Self::new(name);
        artist.external_ids.insert(server, external_id);
        artist.metadata = serde_json::json!({ "source": server.as_str() });
        artist
    }

    pub fn id(&self) -> &ArtistId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_monitored(&self) -> bool {
        self.monitored
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the id this artist has on the given server, if linked
    pub fn external_id(&self, server: ServerType) -> Option<&ExternalId> {
        self.external_ids.get(&server)
    }

    /// Returns all external ids keyed by server type
    pub fn external_ids(&self) -> &BTreeMap<ServerType, ExternalId> {
        &self.external_ids
    }

    /// Sets whether the artist is monitored
    pub fn set_monitored(&mut self, monitored: bool) {
        self.monitored = monitored;
        self.updated_at = Utc::now();
    }

    /// Links the artist to a server item if it is not linked yet
    ///
    /// Returns `true` when the id was recorded, `false` when the artist
    /// already had an id for that server (which is left untouched).
    pub fn attach_external_id(&mut self, server: ServerType, external_id: ExternalId) -> bool {
        if self.external_ids.contains_key(&server) {
            return false;
        }
        self.external_ids.insert(server, external_id);
        self.updated_at = Utc::now();
        true
    }

    /// Case-insensitive name comparison key
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Lowercases and collapses whitespace so names compare case-insensitively
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
