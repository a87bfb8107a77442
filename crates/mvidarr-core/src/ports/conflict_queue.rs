//! Manual conflict queue port
//!
//! Durable holding area for field conflicts that no policy could resolve
//! automatically. Entries carry the full before/after snapshot and are
//! removed only when a human decision has been applied.

use crate::domain::{newtypes::ConflictId, Conflict};

/// Port trait for the manual conflict queue
#[async_trait::async_trait]
pub trait IConflictQueue: Send + Sync {
    /// Queues a conflict
    ///
    /// At most one entry is pending per video, server and field. Queuing the
    /// same key again refreshes the stored values and reason but keeps the
    /// existing entry's id and detection time.
    async fn enqueue(&self, conflict: &Conflict) -> anyhow::Result<()>;

    /// Lists pending conflicts, oldest first
    async fn list(&self) -> anyhow::Result<Vec<Conflict>>;

    /// Retrieves one pending conflict
    async fn get(&self, id: &ConflictId) -> anyhow::Result<Option<Conflict>>;

    /// Removes a conflict; returns `false` when it was not queued
    async fn remove(&self, id: &ConflictId) -> anyhow::Result<bool>;

    /// Number of pending conflicts
    async fn count(&self) -> anyhow::Result<u64>;
}
