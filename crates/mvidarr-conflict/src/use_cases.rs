//! Manual conflict use cases
//!
//! Applies a human decision to an entry of the manual conflict queue and
//! removes the entry once the chosen value has been written.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use mvidarr_core::{
    domain::{Conflict, ConflictId, ManualDecision},
    ports::{ICatalogRepository, IConflictQueue, IMediaServerAdapter},
};

use crate::{error::ConflictError, resolver::DEFAULT_WRITE_TIMEOUT};

/// Orchestrates manual conflict resolution
pub struct ResolveManualConflictUseCase {
    catalog: Arc<dyn ICatalogRepository>,
    queue: Arc<dyn IConflictQueue>,
    write_timeout: Duration,
}

impl ResolveManualConflictUseCase {
    pub fn new(catalog: Arc<dyn ICatalogRepository>, queue: Arc<dyn IConflictQueue>) -> Self {
        Self {
            catalog,
            queue,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Sets the upper bound for the server write of `KeepInternal`
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Lists pending conflicts, oldest first
    pub async fn list(&self) -> Result<Vec<Conflict>, ConflictError> {
        Ok(self.queue.list().await?)
    }

    /// Resolves a queued conflict with the caller's decision
    ///
    /// `KeepExternal` writes the server value into the catalog.
    /// `KeepInternal` pushes the catalog value through `adapter`, which must
    /// be the adapter for the conflict's server. The entry stays queued if
    /// the write fails.
    pub async fn resolve(
        &self,
        id: &ConflictId,
        decision: ManualDecision,
        adapter: Option<&dyn IMediaServerAdapter>,
    ) -> Result<Conflict, ConflictError> {
        let conflict = self
            .queue
            .get(id)
            .await?
            .ok_or_else(|| ConflictError::NotFound(id.to_string()))?;

        let field = conflict.field();

        match decision {
            ManualDecision::KeepExternal => {
                let value = conflict
                    .external_value()
                    .ok_or(ConflictError::MissingValue {
                        side: "server",
                        field,
                    })?;
                self.catalog
                    .update_video_field(conflict.video_id(), field, value)
                    .await?;
            }
            ManualDecision::KeepInternal => {
                let value = conflict
                    .internal_value()
                    .ok_or(ConflictError::MissingValue {
                        side: "catalog",
                        field,
                    })?;
                let server = conflict.server_type();
                let adapter = adapter
                    .filter(|a| a.server_type() == server)
                    .ok_or(ConflictError::AdapterNotRegistered(server))?;
                let write = adapter.write_field(conflict.external_item_id().as_str(), field, value);
                let accepted = match tokio::time::timeout(self.write_timeout, write).await {
                    Ok(written) => written
                        .map_err(|e| ConflictError::ResolutionFailed(format!("write_field: {e}")))?,
                    Err(_) => {
                        let msg = format!(
                            "write_field timed out after {}s",
                            self.write_timeout.as_secs()
                        );
                        warn!(conflict_id = %id, %server, %msg);
                        return Err(ConflictError::ResolutionFailed(msg));
                    }
                };
                if !accepted {
                    return Err(ConflictError::WriteRejected { server, field });
                }
            }
        }

        self.queue.remove(id).await?;

        info!(
            conflict_id = %id,
            decision = %decision,
            field = %field,
            "Manual conflict resolved"
        );

        Ok(conflict)
    }
}
