//! Field difference detection
//!
//! Compares a catalog video with the per-user metadata a media server
//! reported for the matched track, one enabled field at a time.

use tracing::debug;

use mvidarr_core::domain::{CatalogVideo, FieldValue, SyncField};
use mvidarr_core::ports::UserMetadata;

/// One field whose values differ between catalog and server
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub field: SyncField,
    /// Catalog value; `None` when the catalog never set it
    pub internal: Option<FieldValue>,
    /// Server value; always present, unreported fields are not diffs
    pub external: FieldValue,
}

/// Computes field differences for matched pairs
pub struct FieldDiffer;

impl FieldDiffer {
    /// Returns the differing fields among `fields`, in the given order
    ///
    /// A field the server did not report is skipped. A field the server
    /// reported but the catalog never set counts as a difference. Numeric
    /// values are compared with a 0.01 tolerance.
    pub fn diff(video: &CatalogVideo, metadata: &UserMetadata, fields: &[SyncField]) -> Vec<FieldDiff> {
        let diffs: Vec<FieldDiff> = fields
            .iter()
            .filter_map(|&field| {
                let external = metadata.field_value(field)?;
                let internal = video.field_value(field);
                let differs = match &internal {
                    Some(value) => value.differs_from(&external),
                    None => true,
                };
                differs.then_some(FieldDiff {
                    field,
                    internal,
                    external,
                })
            })
            .collect();

        if !diffs.is_empty() {
            debug!(
                video_id = %video.id(),
                title = %video.title(),
                differing = diffs.len(),
                "Field differences detected"
            );
        }

        diffs
    }
}
