//! Domain entities and business logic
//!
//! This module contains the core domain types for MVidarr sync:
//! - Newtypes for type-safe identifiers and the media server enumeration
//! - Catalog artists and videos
//! - Syncable fields and their comparable values
//! - Conflict policies and manual queue entries
//! - Per-server and aggregate sync results
//! - Domain-specific error types

pub mod artist;
pub mod conflict;
pub mod errors;
pub mod field;
pub mod newtypes;
pub mod sync;
pub mod video;

// Re-export commonly used types
pub use artist::{normalize_name, CatalogArtist};
pub use conflict::{Conflict, ConflictPolicy, ConflictReason, ManualDecision};
pub use errors::DomainError;
pub use field::{FieldValue, SyncField, NUMERIC_TOLERANCE};
pub use newtypes::*;
pub use sync::{AggregateResult, SyncDirection, SyncResult, SyncStrategy, SyncTotals};
pub use video::CatalogVideo;
