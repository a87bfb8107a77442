//! MVidarr Conflict - Field-level conflict detection and resolution
//!
//! Provides:
//! - Field diffing between catalog videos and server-reported metadata
//! - Per-field configurable resolution policies
//! - Automatic resolution with re-queueing on failed write-back
//! - Manual queue resolution use case

pub mod detector;
pub mod error;
pub mod policy;
pub mod resolver;
pub mod use_cases;

pub use detector::{FieldDiff, FieldDiffer};
pub use error::ConflictError;
pub use policy::{PolicyEngine, ResolutionAction};
pub use resolver::{ConflictResolver, ReconcileOutcome};
pub use use_cases::ResolveManualConflictUseCase;
