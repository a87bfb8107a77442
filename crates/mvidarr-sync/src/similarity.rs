//! Match confidence between a catalog video and a server-reported item
//!
//! The score is a weighted mean over four comparable fields:
//!
//! | Field    | Weight | Comparison                                   |
//! |----------|--------|----------------------------------------------|
//! | artist   | 40     | normalized Levenshtein on normalized names   |
//! | title    | 35     | normalized Levenshtein on normalized titles  |
//! | album    | 15     | normalized Levenshtein on normalized names   |
//! | duration | 10     | tolerance band with linear falloff           |
//!
//! A field missing on either side is dropped from both the weighted sum and
//! the denominator. With no comparable field at all the score is 0.

use mvidarr_core::domain::{normalize_name, CatalogVideo};
use mvidarr_core::ports::{MediaItem, RemoteTrack};

// ============================================================================
// Weights and tolerances
// ============================================================================

const ARTIST_WEIGHT: f64 = 40.0;
const TITLE_WEIGHT: f64 = 35.0;
const ALBUM_WEIGHT: f64 = 15.0;
const DURATION_WEIGHT: f64 = 10.0;

/// Minimum width of the full-credit duration band, in seconds
const MIN_DURATION_TOLERANCE_SECS: f64 = 30.0;

/// Share of the catalog duration that still earns full credit
const DURATION_TOLERANCE_RATIO: f64 = 0.10;

// ============================================================================
// TrackFields
// ============================================================================

/// The comparable fields of one side of a match
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackFields<'a> {
    pub artist: Option<&'a str>,
    pub title: Option<&'a str>,
    pub album: Option<&'a str>,
    pub duration_secs: Option<u32>,
}

impl<'a> TrackFields<'a> {
    /// Catalog side: the video plus its artist's name
    pub fn from_video(video: &'a CatalogVideo, artist_name: &'a str) -> Self {
        Self {
            artist: Some(artist_name),
            title: Some(video.title()),
            album: video.album(),
            duration_secs: video.duration_secs(),
        }
    }

    pub fn from_remote(track: &'a RemoteTrack) -> Self {
        Self {
            artist: track.artist.as_deref(),
            title: Some(track.title.as_str()),
            album: track.album.as_deref(),
            duration_secs: track.duration_secs,
        }
    }

    pub fn from_media_item(item: &'a MediaItem) -> Self {
        Self {
            artist: item.artist.as_deref(),
            title: Some(item.title.as_str()),
            album: item.album.as_deref(),
            duration_secs: item.duration_secs,
        }
    }
}

// ============================================================================
// SimilarityScorer
// ============================================================================

/// Scores candidate pairs and applies the configured match threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScorer {
    threshold: f64,
}

impl SimilarityScorer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Weighted match confidence in `[0, 1]`
    pub fn score(internal: &TrackFields<'_>, external: &TrackFields<'_>) -> f64 {
        let parts = [
            (ARTIST_WEIGHT, both(internal.artist, external.artist).map(|(a, b)| text_similarity(a, b))),
            (TITLE_WEIGHT, both(internal.title, external.title).map(|(a, b)| text_similarity(a, b))),
            (ALBUM_WEIGHT, both(internal.album, external.album).map(|(a, b)| text_similarity(a, b))),
            (
                DURATION_WEIGHT,
                internal
                    .duration_secs
                    .zip(external.duration_secs)
                    .map(|(a, b)| duration_similarity(a, b)),
            ),
        ];

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (weight, similarity) in parts {
            if let Some(s) = similarity {
                weighted += weight * s;
                total_weight += weight;
            }
        }

        if total_weight == 0.0 {
            return 0.0;
        }
        (weighted / total_weight).clamp(0.0, 1.0)
    }

    /// Whether `score` clears the threshold
    pub fn is_match(&self, score: f64) -> bool {
        score >= self.threshold
    }

    /// Picks the highest-scoring candidate that clears the threshold
    ///
    /// Ties keep the earliest candidate.
    pub fn best_match<'f, T>(
        &self,
        internal: &TrackFields<'_>,
        candidates: impl IntoIterator<Item = T>,
        fields: impl Fn(&T) -> TrackFields<'f>,
    ) -> Option<(T, f64)> {
        let mut best: Option<(T, f64)> = None;
        for candidate in candidates {
            let score = Self::score(internal, &fields(&candidate));
            if !self.is_match(score) {
                continue;
            }
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((candidate, score));
            }
        }
        best
    }
}

/// Both sides present and non-blank
fn both<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<(&'a str, &'a str)> {
    let a = a.filter(|s| !s.trim().is_empty())?;
    let b = b.filter(|s| !s.trim().is_empty())?;
    Some((a, b))
}

/// Normalized edit-distance similarity, case and whitespace insensitive
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Full credit inside the tolerance band, then linear falloff
///
/// The band is `max(30s, 10% of the catalog duration)`. Credit drops
/// linearly to zero over one more band width.
pub fn duration_similarity(internal_secs: u32, external_secs: u32) -> f64 {
    let internal = f64::from(internal_secs);
    let tolerance = (internal * DURATION_TOLERANCE_RATIO).max(MIN_DURATION_TOLERANCE_SECS);
    let delta = (internal - f64::from(external_secs)).abs();

    if delta <= tolerance {
        1.0
    } else {
        (1.0 - (delta - tolerance) / tolerance).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(artist: &'a str, title: &'a str, album: &'a str, secs: u32) -> TrackFields<'a> {
        TrackFields {
            artist: Some(artist),
            title: Some(title),
            album: Some(album),
            duration_secs: Some(secs),
        }
    }

    #[test]
    fn test_identical_fields_score_one() {
        let a = fields("Daft Punk", "Around the World", "Homework", 429);
        assert_eq!(SimilarityScorer::score(&a, &a), 1.0);
    }

    #[test]
    fn test_case_and_spacing_do_not_matter() {
        let a = fields("Daft Punk", "Around the World", "Homework", 429);
        let b = fields("daft  punk", "AROUND THE WORLD", "homework", 431);
        assert_eq!(SimilarityScorer::score(&a, &b), 1.0);
    }

    #[test]
    fn test_all_missing_scores_zero() {
        let empty = TrackFields::default();
        assert_eq!(SimilarityScorer::score(&empty, &empty), 0.0);

        let one_sided = fields("Air", "Sexy Boy", "Moon Safari", 298);
        assert_eq!(SimilarityScorer::score(&one_sided, &empty), 0.0);
    }

    #[test]
    fn test_missing_fields_do_not_penalize() {
        let full = fields("Justice", "Genesis", "Cross", 234);
        let sparse = TrackFields {
            title: Some("Genesis"),
            ..TrackFields::default()
        };
        assert_eq!(SimilarityScorer::score(&full, &sparse), 1.0);
    }

    #[test]
    fn test_blank_strings_count_as_missing() {
        let a = fields("Justice", "Genesis", "", 234);
        let b = fields("Justice", "Genesis", "Cross", 234);
        assert_eq!(SimilarityScorer::score(&a, &b), 1.0);
    }

    #[test]
    fn test_score_stays_in_unit_range() {
        let a = fields("Air", "Sexy Boy", "Moon Safari", 298);
        let b = fields("Metallica", "Battery", "Master of Puppets", 10);
        let s = SimilarityScorer::score(&a, &b);
        assert!((0.0..=1.0).contains(&s));
        assert!(s < 0.5);
    }

    #[test]
    fn test_duration_band() {
        // 10% of 600s is 60s
        assert_eq!(duration_similarity(600, 660), 1.0);
        assert!((duration_similarity(600, 690) - 0.5).abs() < 1e-9);
        assert_eq!(duration_similarity(600, 720), 0.0);
        // short tracks use the 30s floor
        assert_eq!(duration_similarity(100, 130), 1.0);
        assert_eq!(duration_similarity(100, 200), 0.0);
    }

    #[test]
    fn test_best_match_respects_threshold() {
        let scorer = SimilarityScorer::new(0.8);
        let internal = fields("Daft Punk", "One More Time", "Discovery", 320);
        let candidates = vec![
            fields("Daft Punk", "Aerodynamic", "Discovery", 212),
            fields("Daft Punk", "One More Time (Radio Edit)", "Discovery", 320),
            fields("Daft Punk", "One More Time", "Discovery", 321),
        ];

        let (best, score) = scorer
            .best_match(&internal, candidates.iter(), |c| **c)
            .unwrap();
        assert_eq!(best.title, Some("One More Time"));
        assert_eq!(score, 1.0);

        let strict = SimilarityScorer::new(1.0);
        let others = [fields("Air", "Playground Love", "Virgin Suicides", 200)];
        assert!(strict.best_match(&internal, others.iter(), |c| **c).is_none());
    }

    #[test]
    fn test_threshold_is_clamped() {
        assert_eq!(SimilarityScorer::new(1.7).threshold(), 1.0);
        assert_eq!(SimilarityScorer::new(-0.2).threshold(), 0.0);
    }
}
