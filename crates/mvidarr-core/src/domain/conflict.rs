//! Conflict domain entities
//!
//! This module defines the policies used to resolve metadata fields that
//! diverge between the catalog and a media server, and the [`Conflict`]
//! record kept in the manual conflict queue when no policy applies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::field::{FieldValue, SyncField};
use super::newtypes::{ConflictId, ExternalId, ServerType, VideoId};

/// How a differing field is resolved during bidirectional sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The catalog value is pushed to the media server
    MvidarrWins,
    /// The media server value is pulled into the catalog
    ServerWins,
    /// The side modified most recently wins
    NewestWins,
    /// The conflict is queued for a human decision
    ManualReview,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConflictPolicy::MvidarrWins => "mvidarr_wins",
            ConflictPolicy::ServerWins => "server_wins",
            ConflictPolicy::NewestWins => "newest_wins",
            ConflictPolicy::ManualReview => "manual_review",
        };
        write!(f, "{}", s)
    }
}

/// Why a conflict ended up in the manual queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum ConflictReason {
    /// The configured policy for the field is manual review
    ManualReview,
    /// Newest-wins could not compare because a side has no timestamp
    MissingTimestamp,
    /// An automatic resolution failed to apply
    ApplyFailed(String),
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::ManualReview => write!(f, "manual review"),
            ConflictReason::MissingTimestamp => write!(f, "missing last-modified timestamp"),
            ConflictReason::ApplyFailed(err) => write!(f, "apply failed: {}", err),
        }
    }
}

/// A human decision for a queued conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualDecision {
    /// Keep the catalog value and push it to the media server
    KeepInternal,
    /// Take the media server value into the catalog
    KeepExternal,
}

impl std::fmt::Display for ManualDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ManualDecision::KeepInternal => "keep_internal",
            ManualDecision::KeepExternal => "keep_external",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ManualDecision {
    type Err = super::errors::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" | "keep_internal" | "mvidarr" => Ok(ManualDecision::KeepInternal),
            "external" | "keep_external" | "server" => Ok(ManualDecision::KeepExternal),
            other => Err(super::errors::DomainError::ValidationFailed(format!(
                "unknown decision '{other}'; valid: internal, external"
            ))),
        }
    }
}

/// A field-level discrepancy awaiting a manual decision
///
/// Stores a full before/after snapshot so the entry can be resolved
/// without re-contacting the media server to learn what differed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique identifier for this queue entry
    id: ConflictId,
    /// The catalog video whose field differs
    video_id: VideoId,
    /// Video title at detection time, for display
    title: String,
    /// Server that reported the other value
    server_type: ServerType,
    /// The item id on that server
    external_item_id: ExternalId,
    /// The differing field
    field: SyncField,
    /// Catalog value (None when unset)
    internal_value: Option<FieldValue>,
    /// Server value (None when unset)
    external_value: Option<FieldValue>,
    /// Policy that was in effect when the conflict was queued
    policy: ConflictPolicy,
    /// Why the conflict needs manual review
    reason: ConflictReason,
    /// When the conflict was detected
    detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Creates a new queue entry
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        video_id: VideoId,
        title: impl Into<String>,
        server_type: ServerType,
        external_item_id: ExternalId,
        field: SyncField,
        internal_value: Option<FieldValue>,
        external_value: Option<FieldValue>,
        policy: ConflictPolicy,
        reason: ConflictReason,
    ) -> Self {
        Self {
            id: ConflictId::new(),
            video_id,
            title: title.into(),
            server_type,
            external_item_id,
            field,
            internal_value,
            external_value,
            policy,
            reason,
            detected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &ConflictId {
        &self.id
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    pub fn external_item_id(&self) -> &ExternalId {
        &self.external_item_id
    }

    pub fn field(&self) -> SyncField {
        self.field
    }

    pub fn internal_value(&self) -> Option<&FieldValue> {
        self.internal_value.as_ref()
    }

    pub fn external_value(&self) -> Option<&FieldValue> {
        self.external_value.as_ref()
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    pub fn reason(&self) -> &ConflictReason {
        &self.reason
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}
