//! MVidarr Sync - Catalog synchronization with media servers
//!
//! Provides:
//! - Weighted similarity scoring between catalog videos and server tracks
//! - Per-server sync runs (pull, push, bidirectional)
//! - Multi-server orchestration with sequential, parallel and priority
//!   strategies behind a single-flight guard
//!
//! ## Modules
//!
//! - [`similarity`] - Match confidence between a catalog entry and a server item
//! - [`engine`] - One sync run against one media server adapter
//! - [`orchestrator`] - Adapter registry, strategy execution and aggregation

pub mod engine;
pub mod orchestrator;
pub mod similarity;

pub use engine::SyncEngine;
pub use orchestrator::{AdapterStatus, LibraryScanOutcome, OrchestratorStatus, SyncOrchestrator};
pub use similarity::{SimilarityScorer, TrackFields};

use thiserror::Error;

use mvidarr_core::domain::{DomainError, ServerType};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An adapter call did not answer within the configured bound
    #[error("{server} {operation} timed out after {seconds}s")]
    AdapterTimeout {
        server: ServerType,
        operation: &'static str,
        seconds: u64,
    },

    /// The server is enabled and configured but no driver was registered
    #[error("No adapter registered for {0}")]
    AdapterNotRegistered(ServerType),

    /// A domain-level error propagated from mvidarr-core
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
}
