//! Conflict resolution executor
//!
//! Walks the differing fields of one matched (catalog video, server track)
//! pair and applies each field's resolution:
//! - `PullFromServer`: writes the server value into the catalog row
//! - `PushToServer`: writes the catalog value through the adapter
//! - `Queue`: stores the conflict in the manual queue
//!
//! A resolution that fails to apply is re-queued with the failure reason,
//! so every differing field ends up either resolved or queued.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use mvidarr_core::{
    domain::{
        CatalogVideo, Conflict, ConflictPolicy, ConflictReason, ExternalId, FieldValue, SyncField,
    },
    ports::{ICatalogRepository, IConflictQueue, IMediaServerAdapter, UserMetadata},
};

use crate::{
    detector::{FieldDiff, FieldDiffer},
    error::ConflictError,
    policy::{PolicyEngine, ResolutionAction},
};

pub(crate) const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of reconciling one matched pair
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Fields that differed
    pub differences: u32,
    /// Differences resolved automatically
    pub resolved: u32,
    /// Resolved by writing to the media server
    pub pushed: u32,
    /// Resolved by writing to the catalog
    pub pulled: u32,
    /// Differences sent to the manual queue
    pub queued: Vec<Conflict>,
    /// Failures encountered along the way (each also led to a queue entry)
    pub errors: Vec<String>,
}

/// Applies per-field conflict resolutions for matched pairs
pub struct ConflictResolver {
    catalog: Arc<dyn ICatalogRepository>,
    queue: Arc<dyn IConflictQueue>,
    policy: PolicyEngine,
    fields: Vec<SyncField>,
    write_timeout: Duration,
}

impl ConflictResolver {
    pub fn new(
        catalog: Arc<dyn ICatalogRepository>,
        queue: Arc<dyn IConflictQueue>,
        policy: PolicyEngine,
        fields: Vec<SyncField>,
    ) -> Self {
        Self {
            catalog,
            queue,
            policy,
            fields,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Sets the upper bound for one server write
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Diffs and resolves every enabled field of one matched pair
    ///
    /// Never fails as a whole: storage and server errors are recorded in the
    /// outcome and the affected field is queued instead.
    pub async fn reconcile(
        &self,
        video: &CatalogVideo,
        adapter: &dyn IMediaServerAdapter,
        external_item_id: &ExternalId,
        metadata: &UserMetadata,
    ) -> ReconcileOutcome {
        let diffs = FieldDiffer::diff(video, metadata, &self.fields);
        let mut outcome = ReconcileOutcome {
            differences: diffs.len() as u32,
            ..ReconcileOutcome::default()
        };

        for diff in diffs {
            let (policy, action) =
                self.policy
                    .decide(&diff, Some(video.updated_at()), metadata.last_modified);

            let failure = match action {
                ResolutionAction::PullFromServer(value) => {
                    match self.pull(video, diff.field, &value).await {
                        Ok(()) => {
                            outcome.resolved += 1;
                            outcome.pulled += 1;
                            None
                        }
                        Err(e) => Some(e),
                    }
                }
                ResolutionAction::PushToServer(value) => {
                    match self.push(adapter, external_item_id, diff.field, &value).await {
                        Ok(()) => {
                            outcome.resolved += 1;
                            outcome.pushed += 1;
                            None
                        }
                        Err(e) => Some(e),
                    }
                }
                ResolutionAction::Queue(reason) => {
                    self.enqueue(video, adapter, external_item_id, &diff, policy, reason, &mut outcome)
                        .await;
                    continue;
                }
            };

            if let Some(error) = failure {
                let msg = format!(
                    "Failed to apply {} for '{}' field {}: {}",
                    policy,
                    video.title(),
                    diff.field,
                    error
                );
                warn!(%msg);
                outcome.errors.push(msg);
                self.enqueue(
                    video,
                    adapter,
                    external_item_id,
                    &diff,
                    policy,
                    ConflictReason::ApplyFailed(error.to_string()),
                    &mut outcome,
                )
                .await;
            }
        }

        if outcome.differences > 0 {
            info!(
                video_id = %video.id(),
                server = %adapter.server_type(),
                differences = outcome.differences,
                resolved = outcome.resolved,
                queued = outcome.queued.len(),
                "Pair reconciled"
            );
        }

        outcome
    }

    async fn pull(
        &self,
        video: &CatalogVideo,
        field: SyncField,
        value: &FieldValue,
    ) -> Result<(), ConflictError> {
        debug!(video_id = %video.id(), field = %field, value = %value, "Pulling server value");
        self.catalog
            .update_video_field(video.id(), field, value)
            .await?;
        Ok(())
    }

    async fn push(
        &self,
        adapter: &dyn IMediaServerAdapter,
        item_id: &ExternalId,
        field: SyncField,
        value: &FieldValue,
    ) -> Result<(), ConflictError> {
        debug!(item_id = %item_id, field = %field, value = %value, "Pushing catalog value");
        let server = adapter.server_type();
        let write = adapter.write_field(item_id.as_str(), field, value);

        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(ConflictError::WriteRejected { server, field }),
            Ok(Err(e)) => Err(ConflictError::ResolutionFailed(format!("write_field: {e}"))),
            Err(_) => Err(ConflictError::ResolutionFailed(format!(
                "write_field timed out after {}s",
                self.write_timeout.as_secs()
            ))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn enqueue(
        &self,
        video: &CatalogVideo,
        adapter: &dyn IMediaServerAdapter,
        external_item_id: &ExternalId,
        diff: &FieldDiff,
        policy: ConflictPolicy,
        reason: ConflictReason,
        outcome: &mut ReconcileOutcome,
    ) {
        let conflict = Conflict::new(
            *video.id(),
            video.title(),
            adapter.server_type(),
            external_item_id.clone(),
            diff.field,
            diff.internal.clone(),
            Some(diff.external.clone()),
            policy,
            reason,
        );

        if let Err(e) = self.queue.enqueue(&conflict).await {
            let msg = format!("Failed to queue conflict {}: {}", conflict.id(), e);
            warn!(%msg);
            outcome.errors.push(msg);
        } else {
            debug!(
                conflict_id = %conflict.id(),
                field = %diff.field,
                reason = %conflict.reason(),
                "Conflict queued for manual review"
            );
        }

        outcome.queued.push(conflict);
    }
}
