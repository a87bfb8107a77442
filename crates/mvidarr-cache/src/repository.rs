//! SQLite implementation of the catalog and conflict queue ports
//!
//! ## Type Mapping
//!
//! | Domain Type                  | SQL Type | Strategy                                  |
//! |------------------------------|----------|-------------------------------------------|
//! | ArtistId, VideoId, ConflictId| TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | ServerType, SyncField        | TEXT     | snake_case name via `.as_str()`           |
//! | ExternalId                   | TEXT     | String via `.as_str()`                    |
//! | DateTime<Utc>                | TEXT     | RFC 3339 via `to_rfc3339()`               |
//! | FieldValue, ConflictReason   | TEXT     | serde_json serialization                  |
//! | tags                         | TEXT     | serde_json array                          |
//! | metadata                     | TEXT     | serde_json object                         |
//!
//! Entities with private fields are rebuilt by assembling their serde
//! representation from the row and deserializing it, which keeps the stored
//! ids and timestamps instead of minting new ones.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use mvidarr_core::domain::{
    normalize_name, ArtistId, CatalogArtist, CatalogVideo, Conflict, ConflictId, ExternalId,
    FieldValue, ServerType, SyncField, VideoId,
};
use mvidarr_core::ports::{ArtistInsert, ICatalogRepository, IConflictQueue};

use crate::CacheError;

/// SQLite-backed catalog repository and manual conflict queue
#[derive(Clone)]
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Maps each owner id to its `{server: external_id}` object
    async fn external_id_maps(
        &self,
        table: &str,
        owner_column: &str,
        owner_id: Option<&str>,
    ) -> Result<HashMap<String, Map<String, Value>>, CacheError> {
        let rows = match owner_id {
            Some(id) => {
                sqlx::query(&format!(
                    "SELECT {owner_column} AS owner, server_type, external_id \
                     FROM {table} WHERE {owner_column} = ?"
                ))
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {owner_column} AS owner, server_type, external_id FROM {table}"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut maps: HashMap<String, Map<String, Value>> = HashMap::new();
        for row in &rows {
            let owner: String = row.get("owner");
            let server: String = row.get("server_type");
            let external_id: String = row.get("external_id");
            maps.entry(owner)
                .or_default()
                .insert(server, Value::String(external_id));
        }
        Ok(maps)
    }

    async fn artists_from_rows(&self, rows: &[SqliteRow]) -> Result<Vec<CatalogArtist>, CacheError> {
        let single = match rows {
            [row] => Some(row.get::<String, _>("id")),
            _ => None,
        };
        let mut ids = self
            .external_id_maps("artist_external_ids", "artist_id", single.as_deref())
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let external_ids = ids.remove(&id).unwrap_or_default();
                artist_from_row(row, external_ids)
            })
            .collect()
    }

    async fn videos_from_rows(&self, rows: &[SqliteRow]) -> Result<Vec<CatalogVideo>, CacheError> {
        let single = match rows {
            [row] => Some(row.get::<String, _>("id")),
            _ => None,
        };
        let mut ids = self
            .external_id_maps("video_external_ids", "video_id", single.as_deref())
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let external_ids = ids.remove(&id).unwrap_or_default();
                video_from_row(row, external_ids)
            })
            .collect()
    }

    async fn insert_external_ids(
        &self,
        table: &str,
        owner_column: &str,
        owner_id: &str,
        ids: impl Iterator<Item = (&ServerType, &ExternalId)>,
    ) -> Result<(), CacheError> {
        let sql = format!(
            "INSERT OR IGNORE INTO {table} ({owner_column}, server_type, external_id) \
             VALUES (?, ?, ?)"
        );
        for (server, external_id) in ids {
            sqlx::query(&sql)
                .bind(owner_id)
                .bind(server.as_str())
                .bind(external_id.as_str())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn serialization_error(what: &str, e: impl std::fmt::Display) -> CacheError {
    CacheError::SerializationError(format!("Invalid {what}: {e}"))
}

fn parse_json(what: &str, text: &str) -> Result<Value, CacheError> {
    serde_json::from_str(text).map_err(|e| serialization_error(what, e))
}

fn parse_optional_json(what: &str, text: Option<String>) -> Result<Value, CacheError> {
    match text {
        Some(t) => parse_json(what, &t),
        None => Ok(Value::Null),
    }
}

/// Reconstruct a CatalogArtist from a database row
fn artist_from_row(row: &SqliteRow, external_ids: Map<String, Value>) -> Result<CatalogArtist, CacheError> {
    let metadata: String = row.get("metadata");
    let value = json!({
        "id": row.get::<String, _>("id"),
        "name": row.get::<String, _>("name"),
        "monitored": row.get::<bool, _>("monitored"),
        "external_ids": external_ids,
        "metadata": parse_json("artist metadata", &metadata)?,
        "created_at": row.get::<String, _>("created_at"),
        "updated_at": row.get::<String, _>("updated_at"),
    });
    serde_json::from_value(value).map_err(|e| serialization_error("artist row", e))
}

/// Reconstruct a CatalogVideo from a database row
fn video_from_row(row: &SqliteRow, external_ids: Map<String, Value>) -> Result<CatalogVideo, CacheError> {
    let tags: String = row.get("tags");
    let value = json!({
        "id": row.get::<String, _>("id"),
        "artist_id": row.get::<String, _>("artist_id"),
        "title": row.get::<String, _>("title"),
        "album": row.get::<Option<String>, _>("album"),
        "year": row.get::<Option<i64>, _>("year"),
        "duration_secs": row.get::<Option<i64>, _>("duration_secs"),
        "play_count": row.get::<i64, _>("play_count"),
        "last_played": row.get::<Option<String>, _>("last_played"),
        "favorite": row.get::<bool, _>("favorite"),
        "rating": row.get::<Option<f64>, _>("rating"),
        "watched": row.get::<bool, _>("watched"),
        "tags": parse_json("video tags", &tags)?,
        "notes": row.get::<Option<String>, _>("notes"),
        "external_ids": external_ids,
        "updated_at": row.get::<String, _>("updated_at"),
    });
    serde_json::from_value(value).map_err(|e| serialization_error("video row", e))
}

/// Reconstruct a queued Conflict from a database row
fn conflict_from_row(row: &SqliteRow) -> Result<Conflict, CacheError> {
    let reason: String = row.get("reason");
    let value = json!({
        "id": row.get::<String, _>("id"),
        "video_id": row.get::<String, _>("video_id"),
        "title": row.get::<String, _>("title"),
        "server_type": row.get::<String, _>("server_type"),
        "external_item_id": row.get::<String, _>("external_item_id"),
        "field": row.get::<String, _>("field"),
        "internal_value": parse_optional_json("internal value", row.get("internal_value"))?,
        "external_value": parse_optional_json("external value", row.get("external_value"))?,
        "policy": row.get::<String, _>("policy"),
        "reason": parse_json("conflict reason", &reason)?,
        "detected_at": row.get::<String, _>("detected_at"),
    });
    serde_json::from_value(value).map_err(|e| serialization_error("conflict row", e))
}

/// Column holding a syncable field in the `videos` table
fn field_column(field: SyncField) -> &'static str {
    match field {
        SyncField::PlayCount => "play_count",
        SyncField::LastPlayed => "last_played",
        SyncField::Rating => "rating",
        SyncField::Favorite => "favorite",
        SyncField::WatchedStatus => "watched",
        SyncField::Tags => "tags",
        SyncField::Notes => "notes",
    }
}

fn policy_name(conflict: &Conflict) -> String {
    conflict.policy().to_string()
}

// ============================================================================
// ICatalogRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl ICatalogRepository for SqliteCatalogRepository {
    // --- Artist operations ---

    async fn save_artist(&self, artist: &CatalogArtist) -> anyhow::Result<()> {
        let id = artist.id().to_string();
        let metadata = serde_json::to_string(artist.metadata())
            .map_err(|e| anyhow::anyhow!("Failed to serialize metadata: {}", e))?;

        sqlx::query(
            "INSERT INTO artists (id, name, name_key, monitored, metadata, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
               name = excluded.name, name_key = excluded.name_key, \
               monitored = excluded.monitored, metadata = excluded.metadata, \
               updated_at = excluded.updated_at",
        )
        .bind(&id)
        .bind(artist.name())
        .bind(artist.name_key())
        .bind(artist.is_monitored())
        .bind(&metadata)
        .bind(artist.created_at().to_rfc3339())
        .bind(artist.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.insert_external_ids(
            "artist_external_ids",
            "artist_id",
            &id,
            artist.external_ids().iter(),
        )
        .await?;

        tracing::trace!(artist_id = %id, name = %artist.name(), "Saved artist");
        Ok(())
    }

    async fn get_artist(&self, id: &ArtistId) -> anyhow::Result<Option<CatalogArtist>> {
        let rows = sqlx::query("SELECT * FROM artists WHERE id = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(self.artists_from_rows(&rows).await?.into_iter().next())
    }

    async fn list_artists(&self) -> anyhow::Result<Vec<CatalogArtist>> {
        let rows = sqlx::query("SELECT * FROM artists ORDER BY name_key ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(self.artists_from_rows(&rows).await?)
    }

    async fn find_artist_by_external_id(
        &self,
        server: ServerType,
        external_id: &ExternalId,
    ) -> anyhow::Result<Option<CatalogArtist>> {
        let rows = sqlx::query(
            "SELECT a.* FROM artists a \
             JOIN artist_external_ids e ON e.artist_id = a.id \
             WHERE e.server_type = ? AND e.external_id = ?",
        )
        .bind(server.as_str())
        .bind(external_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.artists_from_rows(&rows).await?.into_iter().next())
    }

    async fn insert_artist_if_absent(
        &self,
        artist: &CatalogArtist,
    ) -> anyhow::Result<ArtistInsert> {
        let id = artist.id().to_string();
        let metadata = serde_json::to_string(artist.metadata())
            .map_err(|e| anyhow::anyhow!("Failed to serialize metadata: {}", e))?;

        let inserted = sqlx::query(
            "INSERT INTO artists (id, name, name_key, monitored, metadata, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name_key) DO NOTHING",
        )
        .bind(&id)
        .bind(artist.name())
        .bind(artist.name_key())
        .bind(artist.is_monitored())
        .bind(&metadata)
        .bind(artist.created_at().to_rfc3339())
        .bind(artist.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            self.insert_external_ids(
                "artist_external_ids",
                "artist_id",
                &id,
                artist.external_ids().iter(),
            )
            .await?;
            tracing::trace!(artist_id = %id, name = %artist.name(), "Inserted artist");
            return Ok(ArtistInsert::Created);
        }

        let rows = sqlx::query("SELECT * FROM artists WHERE name_key = ?")
            .bind(normalize_name(artist.name()))
            .fetch_all(&self.pool)
            .await?;
        let existing = self
            .artists_from_rows(&rows)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Artist '{}' vanished after conflict", artist.name()))?;

        tracing::trace!(artist_id = %existing.id(), name = %artist.name(), "Artist already present");
        Ok(ArtistInsert::Existing(existing))
    }

    async fn attach_artist_external_id(
        &self,
        id: &ArtistId,
        server: ServerType,
        external_id: &ExternalId,
    ) -> anyhow::Result<bool> {
        let id = id.to_string();
        let attached = sqlx::query(
            "INSERT OR IGNORE INTO artist_external_ids (artist_id, server_type, external_id) \
             VALUES (?, ?, ?)",
        )
        .bind(&id)
        .bind(server.as_str())
        .bind(external_id.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        if attached {
            sqlx::query("UPDATE artists SET updated_at = ? WHERE id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(&id)
                .execute(&self.pool)
                .await?;
            tracing::trace!(artist_id = %id, server = %server, "Attached artist external id");
        }

        Ok(attached)
    }

    // --- Video operations ---

    async fn save_video(&self, video: &CatalogVideo) -> anyhow::Result<()> {
        let id = video.id().to_string();
        let tags = serde_json::to_string(video.tags())
            .map_err(|e| anyhow::anyhow!("Failed to serialize tags: {}", e))?;

        sqlx::query(
            "INSERT INTO videos \
             (id, artist_id, title, album, year, duration_secs, play_count, last_played, \
              favorite, rating, watched, tags, notes, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
               artist_id = excluded.artist_id, title = excluded.title, album = excluded.album, \
               year = excluded.year, duration_secs = excluded.duration_secs, \
               play_count = excluded.play_count, last_played = excluded.last_played, \
               favorite = excluded.favorite, rating = excluded.rating, \
               watched = excluded.watched, tags = excluded.tags, notes = excluded.notes, \
               updated_at = excluded.updated_at",
        )
        .bind(&id)
        .bind(video.artist_id().to_string())
        .bind(video.title())
        .bind(video.album())
        .bind(video.year())
        .bind(video.duration_secs().map(i64::from))
        .bind(video.play_count() as i64)
        .bind(video.last_played().map(|dt| dt.to_rfc3339()))
        .bind(video.is_favorite())
        .bind(video.rating())
        .bind(video.is_watched())
        .bind(&tags)
        .bind(video.notes())
        .bind(video.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.insert_external_ids(
            "video_external_ids",
            "video_id",
            &id,
            video.external_ids().iter(),
        )
        .await?;

        tracing::trace!(video_id = %id, title = %video.title(), "Saved video");
        Ok(())
    }

    async fn get_video(&self, id: &VideoId) -> anyhow::Result<Option<CatalogVideo>> {
        let rows = sqlx::query("SELECT * FROM videos WHERE id = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(self.videos_from_rows(&rows).await?.into_iter().next())
    }

    async fn list_videos_by_artist(
        &self,
        artist_id: &ArtistId,
    ) -> anyhow::Result<Vec<CatalogVideo>> {
        let rows = sqlx::query("SELECT * FROM videos WHERE artist_id = ? ORDER BY title ASC")
            .bind(artist_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(self.videos_from_rows(&rows).await?)
    }

    async fn find_video_by_external_id(
        &self,
        server: ServerType,
        external_id: &ExternalId,
    ) -> anyhow::Result<Option<CatalogVideo>> {
        let rows = sqlx::query(
            "SELECT v.* FROM videos v \
             JOIN video_external_ids e ON e.video_id = v.id \
             WHERE e.server_type = ? AND e.external_id = ?",
        )
        .bind(server.as_str())
        .bind(external_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.videos_from_rows(&rows).await?.into_iter().next())
    }

    async fn attach_video_external_id(
        &self,
        id: &VideoId,
        server: ServerType,
        external_id: &ExternalId,
    ) -> anyhow::Result<bool> {
        let id = id.to_string();
        let attached = sqlx::query(
            "INSERT OR IGNORE INTO video_external_ids (video_id, server_type, external_id) \
             VALUES (?, ?, ?)",
        )
        .bind(&id)
        .bind(server.as_str())
        .bind(external_id.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        if attached {
            tracing::trace!(video_id = %id, server = %server, "Attached video external id");
        }
        Ok(attached)
    }

    async fn update_video_field(
        &self,
        id: &VideoId,
        field: SyncField,
        value: &FieldValue,
    ) -> anyhow::Result<()> {
        // Validate kind against the entity before touching the row
        let mut video = self
            .get_video(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Video not found: {}", id))?;
        video.apply_field(field, value.clone())?;

        let sql = format!(
            "UPDATE videos SET {} = ?, updated_at = ? WHERE id = ?",
            field_column(field)
        );
        let query = sqlx::query(&sql);
        let query = match value {
            FieldValue::Count(n) => query.bind(*n as i64),
            FieldValue::Timestamp(ts) => query.bind(ts.to_rfc3339()),
            FieldValue::Rating(r) => query.bind(*r),
            FieldValue::Flag(b) => query.bind(*b),
            FieldValue::Tags(tags) => query.bind(
                serde_json::to_string(tags)
                    .map_err(|e| anyhow::anyhow!("Failed to serialize tags: {}", e))?,
            ),
            FieldValue::Text(text) => query.bind(text.clone()),
        };

        query
            .bind(video.updated_at().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        tracing::trace!(video_id = %id, field = %field, "Updated video field");
        Ok(())
    }
}

// ============================================================================
// IConflictQueue implementation
// ============================================================================

#[async_trait::async_trait]
impl IConflictQueue for SqliteCatalogRepository {
    async fn enqueue(&self, conflict: &Conflict) -> anyhow::Result<()> {
        let id = conflict.id().to_string();
        let internal_value = conflict
            .internal_value()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| anyhow::anyhow!("Failed to serialize internal value: {}", e))?;
        let external_value = conflict
            .external_value()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| anyhow::anyhow!("Failed to serialize external value: {}", e))?;
        let reason = serde_json::to_string(conflict.reason())
            .map_err(|e| anyhow::anyhow!("Failed to serialize reason: {}", e))?;

        sqlx::query(
            "INSERT INTO manual_conflicts \
             (id, video_id, title, server_type, external_item_id, field, \
              internal_value, external_value, policy, reason, detected_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(video_id, server_type, field) DO UPDATE SET \
              title = excluded.title, \
              external_item_id = excluded.external_item_id, \
              internal_value = excluded.internal_value, \
              external_value = excluded.external_value, \
              policy = excluded.policy, \
              reason = excluded.reason",
        )
        .bind(&id)
        .bind(conflict.video_id().to_string())
        .bind(conflict.title())
        .bind(conflict.server_type().as_str())
        .bind(conflict.external_item_id().as_str())
        .bind(conflict.field().as_str())
        .bind(&internal_value)
        .bind(&external_value)
        .bind(policy_name(conflict))
        .bind(&reason)
        .bind(conflict.detected_at().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(conflict_id = %id, field = %conflict.field(), "Queued conflict");
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<Conflict>> {
        let rows = sqlx::query("SELECT * FROM manual_conflicts ORDER BY detected_at ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut conflicts = Vec::with_capacity(rows.len());
        for row in &rows {
            conflicts.push(conflict_from_row(row)?);
        }
        Ok(conflicts)
    }

    async fn get(&self, id: &ConflictId) -> anyhow::Result<Option<Conflict>> {
        let row = sqlx::query("SELECT * FROM manual_conflicts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(conflict_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, id: &ConflictId) -> anyhow::Result<bool> {
        let removed = sqlx::query("DELETE FROM manual_conflicts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::trace!(conflict_id = %id, removed, "Removed conflict");
        Ok(removed == 1)
    }

    async fn count(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM manual_conflicts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
