//! Error types for the conflict engine

use thiserror::Error;

use mvidarr_core::domain::{DomainError, ServerType, SyncField};

/// Errors that can occur during conflict resolution
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Conflict not found in the manual queue
    #[error("conflict not found: {0}")]
    NotFound(String),

    /// The chosen side has no value to apply
    #[error("no {side} value recorded for field {field}")]
    MissingValue { side: &'static str, field: SyncField },

    /// Pushing a value requires the server's adapter
    #[error("adapter not registered: {0}")]
    AdapterNotRegistered(ServerType),

    /// The server reported that it cannot store the field
    #[error("{server} does not accept writes to {field}")]
    WriteRejected { server: ServerType, field: SyncField },

    /// Resolution operation failed (catalog write or server write-back)
    #[error("resolution failed: {0}")]
    ResolutionFailed(String),

    /// Domain invariant violated
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
