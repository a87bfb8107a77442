//! Per-server synchronization engine
//!
//! The [`SyncEngine`] runs one synchronization pass against one media server
//! adapter and reports a [`SyncResult`].
//!
//! ## Sync Flow
//!
//! 1. **Libraries**: enumerate the server's music libraries (optionally one).
//!    A failure here ends the run with a single error.
//! 2. **Pull** (from-server, bidirectional): match every reported artist
//!    against the catalog, create the unmatched ones, backfill missing ids.
//! 3. **Reconcile** (bidirectional): pair each matched artist's tracks with
//!    catalog videos and hand the pairs to the conflict resolver.
//! 4. **Push** (to-server, bidirectional): link catalog artists and videos
//!    that have no id on this server by searching the server.
//!
//! Items are processed sequentially in the order the server reports them.
//! A failing item is recorded in `errors` and the run moves on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use mvidarr_conflict::{ConflictResolver, PolicyEngine};
use mvidarr_core::config::Config;
use mvidarr_core::domain::{
    normalize_name, CatalogArtist, CatalogVideo, ExternalId, ServerType, SyncDirection,
    SyncResult,
};
use mvidarr_core::ports::{
    ArtistInsert, ICatalogRepository, IConflictQueue, IMediaServerAdapter, Library, MediaItem,
    MediaType, RemoteArtist, RemoteTrack,
};

use crate::similarity::{text_similarity, SimilarityScorer, TrackFields};
use crate::SyncError;

// ============================================================================
// Adapter call timeout
// ============================================================================

/// Runs one adapter call under `limit`
///
/// A call that does not finish in time fails with
/// [`SyncError::AdapterTimeout`] naming the operation.
pub(crate) async fn with_timeout<T, F>(
    limit: Duration,
    server: ServerType,
    operation: &'static str,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::AdapterTimeout {
            server,
            operation,
            seconds: limit.as_secs(),
        }
        .into()),
    }
}

// ============================================================================
// Artist matching
// ============================================================================

/// Finds the catalog artist a server-reported name refers to
///
/// Exact case-insensitive equality wins; otherwise the first artist whose
/// name contains the reported name, or is contained by it, is taken.
/// Track-level pairing uses the weighted scorer instead.
pub fn match_artist<'a>(artists: &'a [CatalogArtist], reported: &str) -> Option<&'a CatalogArtist> {
    let key = normalize_name(reported);
    if key.is_empty() {
        return None;
    }

    artists
        .iter()
        .find(|a| a.name_key() == key)
        .or_else(|| {
            artists.iter().find(|a| {
                let name = a.name_key();
                !name.is_empty() && (name.contains(&key) || key.contains(&name))
            })
        })
}

/// A catalog artist paired with the server's record of it
struct ArtistPair {
    artist: CatalogArtist,
    remote: RemoteArtist,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Runs sync passes for one server at a time
///
/// The engine holds no per-run state; one instance is shared by every
/// concurrent run under the parallel strategy.
pub struct SyncEngine {
    /// Catalog store
    catalog: Arc<dyn ICatalogRepository>,
    /// Field-level reconciliation for bidirectional runs
    resolver: ConflictResolver,
    /// Track pairing
    scorer: SimilarityScorer,
    /// Upper bound for any single adapter call
    call_timeout: Duration,
}

impl SyncEngine {
    pub fn new(
        catalog: Arc<dyn ICatalogRepository>,
        resolver: ConflictResolver,
        scorer: SimilarityScorer,
        call_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            resolver,
            scorer,
            call_timeout,
        }
    }

    /// Builds an engine from the `sync` and `conflicts` config sections
    pub fn from_config(
        catalog: Arc<dyn ICatalogRepository>,
        queue: Arc<dyn IConflictQueue>,
        config: &Config,
    ) -> Self {
        let call_timeout = Duration::from_secs(config.sync.adapter_timeout_secs.max(1));
        let resolver = ConflictResolver::new(
            catalog.clone(),
            queue,
            PolicyEngine::from_config(&config.conflicts),
            config.sync.fields.enabled_fields(),
        )
        .with_write_timeout(call_timeout);

        Self::new(
            catalog,
            resolver,
            SimilarityScorer::new(config.sync.similarity_threshold),
            call_timeout,
        )
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    // ========================================================================
    // run()
    // ========================================================================

    /// Performs one sync pass against `adapter`
    ///
    /// Never fails as a whole: every problem ends up in the returned
    /// result's `errors`, alongside whatever progress was made.
    #[tracing::instrument(skip(self, adapter), fields(server = %adapter.server_type()))]
    pub async fn run(
        &self,
        adapter: &dyn IMediaServerAdapter,
        direction: SyncDirection,
        library_filter: Option<&str>,
    ) -> SyncResult {
        let server = adapter.server_type();
        let mut result = SyncResult::new(server);

        info!(%direction, library = ?library_filter, "Starting sync run");

        // Step 1: enumerate libraries; failure is fatal for this server
        let libraries = match self.music_libraries(adapter, library_filter).await {
            Ok(libraries) => libraries,
            Err(err) => {
                let msg = format!("Failed to enumerate libraries: {err:#}");
                warn!(%msg);
                result.errors.push(msg);
                result.finish();
                return result;
            }
        };

        debug!(libraries = libraries.len(), "Music libraries found");

        // Step 2: pull artists
        let pairs = if direction.pulls() {
            match self.pull_artists(adapter, &libraries, &mut result).await {
                Ok(pairs) => pairs,
                Err(err) => {
                    let msg = format!("Failed to pull artists: {err:#}");
                    warn!(%msg);
                    result.errors.push(msg);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        // Step 3: reconcile matched tracks
        if direction == SyncDirection::Bidirectional {
            for pair in &pairs {
                self.reconcile_artist(adapter, pair, &mut result).await;
            }
        }

        // Step 4: link catalog entries on the server
        if direction.pushes() {
            if let Err(err) = self.push_links(adapter, &mut result).await {
                let msg = format!("Failed to push catalog links: {err:#}");
                warn!(%msg);
                result.errors.push(msg);
            }
        }

        result.finish();

        info!(
            processed = result.items_processed,
            created = result.new_entities_created,
            to_server = result.updates_to_server,
            from_server = result.updates_from_server,
            resolved = result.conflicts_resolved,
            queued = result.manual_conflicts.len(),
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Sync run completed"
        );

        result
    }

    async fn music_libraries(
        &self,
        adapter: &dyn IMediaServerAdapter,
        library_filter: Option<&str>,
    ) -> Result<Vec<Library>> {
        let libraries = with_timeout(
            self.call_timeout,
            adapter.server_type(),
            "get_music_libraries",
            adapter.get_music_libraries(),
        )
        .await?;

        let Some(filter) = library_filter else {
            return Ok(libraries);
        };

        let selected: Vec<Library> = libraries
            .into_iter()
            .filter(|lib| lib.id == filter || lib.name.eq_ignore_ascii_case(filter))
            .collect();
        if selected.is_empty() {
            anyhow::bail!("no music library matches '{}'", filter);
        }
        Ok(selected)
    }

    // ========================================================================
    // Pull
    // ========================================================================

    /// Matches every reported artist against the catalog
    ///
    /// Returns the matched or created artists paired with their server
    /// records, in reported order.
    async fn pull_artists(
        &self,
        adapter: &dyn IMediaServerAdapter,
        libraries: &[Library],
        result: &mut SyncResult,
    ) -> Result<Vec<ArtistPair>> {
        let server = adapter.server_type();
        let mut known = self
            .catalog
            .list_artists()
            .await
            .context("Failed to load catalog artists")?;
        let mut pairs = Vec::new();

        for library in libraries {
            let reported = match with_timeout(
                self.call_timeout,
                server,
                "get_artists",
                adapter.get_artists(Some(&library.id)),
            )
            .await
            {
                Ok(artists) => artists,
                Err(err) => {
                    let msg = format!("Failed to list artists in library '{}': {err:#}", library.name);
                    warn!(%msg);
                    result.errors.push(msg);
                    continue;
                }
            };

            debug!(library = %library.name, artists = reported.len(), "Artists reported");

            for remote in reported {
                result.items_processed += 1;
                match self.pull_artist(server, &remote, &mut known, result).await {
                    Ok(artist) => pairs.push(ArtistPair { artist, remote }),
                    Err(err) => {
                        let msg = format!("Error syncing artist '{}' ({}): {err:#}", remote.name, remote.id);
                        warn!(%msg);
                        result.errors.push(msg);
                    }
                }
            }
        }

        Ok(pairs)
    }

    /// Matches one reported artist, creating or backfilling as needed
    async fn pull_artist(
        &self,
        server: ServerType,
        remote: &RemoteArtist,
        known: &mut Vec<CatalogArtist>,
        result: &mut SyncResult,
    ) -> Result<CatalogArtist> {
        let external_id = ExternalId::new(remote.id.clone())?;

        if let Some(linked) = known
            .iter()
            .find(|a| a.external_id(server) == Some(&external_id))
        {
            return Ok(linked.clone());
        }

        let matched = match_artist(known, &remote.name).map(|a| *a.id());
        if let Some(index) = matched.and_then(|id| known.iter().position(|a| *a.id() == id)) {
            self.backfill_artist_id(server, &external_id, &mut known[index], result)
                .await?;
            return Ok(known[index].clone());
        }

        let candidate = CatalogArtist::discovered_on(remote.name.clone(), server, external_id.clone());
        match self.catalog.insert_artist_if_absent(&candidate).await? {
            ArtistInsert::Created => {
                result.new_entities_created += 1;
                info!(artist = %candidate.name(), external_id = %external_id, "Created artist");
                known.push(candidate.clone());
                Ok(candidate)
            }
            ArtistInsert::Existing(mut existing) => {
                // Created by a concurrent run for another server
                self.backfill_artist_id(server, &external_id, &mut existing, result)
                    .await?;
                known.push(existing.clone());
                Ok(existing)
            }
        }
    }

    /// Records the server id on a matched artist if it has none yet
    async fn backfill_artist_id(
        &self,
        server: ServerType,
        external_id: &ExternalId,
        artist: &mut CatalogArtist,
        result: &mut SyncResult,
    ) -> Result<()> {
        if artist.external_id(server).is_some() {
            return Ok(());
        }

        if self
            .catalog
            .attach_artist_external_id(artist.id(), server, external_id)
            .await?
        {
            artist.attach_external_id(server, external_id.clone());
            result.updates_from_server += 1;
            debug!(artist = %artist.name(), external_id = %external_id, "Backfilled artist id");
        }
        Ok(())
    }

    // ========================================================================
    // Reconcile
    // ========================================================================

    /// Walks one matched artist's albums and tracks and reconciles each pair
    async fn reconcile_artist(
        &self,
        adapter: &dyn IMediaServerAdapter,
        pair: &ArtistPair,
        result: &mut SyncResult,
    ) {
        let server = adapter.server_type();

        let mut videos = match self.catalog.list_videos_by_artist(pair.artist.id()).await {
            Ok(videos) => videos,
            Err(err) => {
                let msg = format!("Failed to load videos for '{}': {err:#}", pair.artist.name());
                warn!(%msg);
                result.errors.push(msg);
                return;
            }
        };
        if videos.is_empty() {
            return;
        }

        let albums = match with_timeout(
            self.call_timeout,
            server,
            "get_artist_albums",
            adapter.get_artist_albums(&pair.remote.id),
        )
        .await
        {
            Ok(albums) => albums,
            Err(err) => {
                let msg = format!("Failed to list albums for '{}': {err:#}", pair.remote.name);
                warn!(%msg);
                result.errors.push(msg);
                return;
            }
        };

        for album in albums {
            let tracks = match with_timeout(
                self.call_timeout,
                server,
                "get_album_tracks",
                adapter.get_album_tracks(&album.id),
            )
            .await
            {
                Ok(tracks) => tracks,
                Err(err) => {
                    let msg = format!("Failed to list tracks of album '{}': {err:#}", album.name);
                    warn!(%msg);
                    result.errors.push(msg);
                    continue;
                }
            };

            for track in tracks {
                result.items_processed += 1;
                if let Err(err) = self
                    .reconcile_track(adapter, &pair.artist, &mut videos, &track, result)
                    .await
                {
                    let msg = format!("Error reconciling track '{}' ({}): {err:#}", track.title, track.id);
                    warn!(%msg);
                    result.errors.push(msg);
                }
            }
        }
    }

    async fn reconcile_track(
        &self,
        adapter: &dyn IMediaServerAdapter,
        artist: &CatalogArtist,
        videos: &mut [CatalogVideo],
        track: &RemoteTrack,
        result: &mut SyncResult,
    ) -> Result<()> {
        let server = adapter.server_type();
        let external_id = ExternalId::new(track.id.clone())?;

        let index = match videos
            .iter()
            .position(|v| v.external_id(server) == Some(&external_id))
        {
            Some(index) => index,
            None => {
                let Some(index) = self.pair_track(artist, videos, track, server) else {
                    debug!(track = %track.title, "No catalog video matches track");
                    return Ok(());
                };
                if self
                    .catalog
                    .attach_video_external_id(videos[index].id(), server, &external_id)
                    .await?
                {
                    videos[index].attach_external_id(server, external_id.clone());
                    result.updates_from_server += 1;
                }
                index
            }
        };

        let outcome = self
            .resolver
            .reconcile(&videos[index], adapter, &external_id, &track.user_metadata)
            .await;

        result.conflicts_resolved += outcome.resolved;
        result.updates_to_server += outcome.pushed;
        result.updates_from_server += outcome.pulled;
        result.manual_conflicts.extend(outcome.queued);
        result.errors.extend(outcome.errors);

        if outcome.pulled > 0 {
            if let Some(fresh) = self.catalog.get_video(videos[index].id()).await? {
                videos[index] = fresh;
            }
        }
        Ok(())
    }

    /// Best unlinked catalog video for a reported track, if any clears the threshold
    fn pair_track(
        &self,
        artist: &CatalogArtist,
        videos: &[CatalogVideo],
        track: &RemoteTrack,
        server: ServerType,
    ) -> Option<usize> {
        let mut external = TrackFields::from_remote(track);
        if external.artist.is_none() {
            external.artist = Some(artist.name());
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, video) in videos.iter().enumerate() {
            if video.external_id(server).is_some() {
                continue;
            }
            let score =
                SimilarityScorer::score(&TrackFields::from_video(video, artist.name()), &external);
            if self.scorer.is_match(score) && best.map_or(true, |(_, s)| score > s) {
                best = Some((index, score));
            }
        }

        best.map(|(index, score)| {
            debug!(track = %track.title, score, "Track paired by similarity");
            index
        })
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Links catalog artists and videos the server does not know yet
    async fn push_links(
        &self,
        adapter: &dyn IMediaServerAdapter,
        result: &mut SyncResult,
    ) -> Result<()> {
        let server = adapter.server_type();
        let artists = self
            .catalog
            .list_artists()
            .await
            .context("Failed to load catalog artists")?;

        for artist in &artists {
            if artist.external_id(server).is_none() {
                result.items_processed += 1;
                if let Err(err) = self.push_artist(adapter, artist, result).await {
                    let msg = format!("Error linking artist '{}': {err:#}", artist.name());
                    warn!(%msg);
                    result.errors.push(msg);
                }
            }

            let videos = match self.catalog.list_videos_by_artist(artist.id()).await {
                Ok(videos) => videos,
                Err(err) => {
                    let msg = format!("Failed to load videos for '{}': {err:#}", artist.name());
                    warn!(%msg);
                    result.errors.push(msg);
                    continue;
                }
            };

            for video in videos.iter().filter(|v| v.external_id(server).is_none()) {
                result.items_processed += 1;
                if let Err(err) = self.push_video(adapter, artist, video, result).await {
                    let msg = format!("Error linking video '{}': {err:#}", video.title());
                    warn!(%msg);
                    result.errors.push(msg);
                }
            }
        }

        Ok(())
    }

    async fn push_artist(
        &self,
        adapter: &dyn IMediaServerAdapter,
        artist: &CatalogArtist,
        result: &mut SyncResult,
    ) -> Result<()> {
        let server = adapter.server_type();
        let hits = with_timeout(
            self.call_timeout,
            server,
            "search_media",
            adapter.search_media(artist.name(), Some(MediaType::Artist)),
        )
        .await?;

        let best = hits
            .iter()
            .filter(|hit| hit.media_type == MediaType::Artist)
            .map(|hit| (hit, text_similarity(artist.name(), &hit.title)))
            .filter(|(_, score)| self.scorer.is_match(*score))
            .fold(None::<(&MediaItem, f64)>, |best, (hit, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((hit, score)),
            });

        let Some((hit, score)) = best else {
            debug!(artist = %artist.name(), "No server artist found");
            return Ok(());
        };

        let external_id = ExternalId::new(hit.id.clone())?;
        if self
            .catalog
            .attach_artist_external_id(artist.id(), server, &external_id)
            .await?
        {
            result.updates_to_server += 1;
            debug!(artist = %artist.name(), external_id = %external_id, score, "Linked artist");
        }
        Ok(())
    }

    async fn push_video(
        &self,
        adapter: &dyn IMediaServerAdapter,
        artist: &CatalogArtist,
        video: &CatalogVideo,
        result: &mut SyncResult,
    ) -> Result<()> {
        let server = adapter.server_type();
        let hits = with_timeout(
            self.call_timeout,
            server,
            "search_media",
            adapter.search_media(video.title(), Some(MediaType::Track)),
        )
        .await?;

        let internal = TrackFields::from_video(video, artist.name());
        let best = self.scorer.best_match(
            &internal,
            hits.iter().filter(|hit| hit.media_type == MediaType::Track),
            |hit| TrackFields::from_media_item(*hit),
        );

        let Some((hit, score)) = best else {
            debug!(video = %video.title(), "No server track found");
            return Ok(());
        };

        let external_id = ExternalId::new(hit.id.clone())?;
        if self
            .catalog
            .attach_video_external_id(video.id(), server, &external_id)
            .await?
        {
            result.updates_to_server += 1;
            debug!(video = %video.title(), external_id = %external_id, score, "Linked video");
        }
        Ok(())
    }
}
