//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and field/value mismatches.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid external identifier reported by a media server
    #[error("Invalid external ID: {0}")]
    InvalidExternalId(String),

    /// Unknown media server type
    #[error("Unknown server type: {0}")]
    UnknownServerType(String),

    /// Unknown syncable field name
    #[error("Unknown sync field: {0}")]
    UnknownField(String),

    /// A value of the wrong kind was applied to a field
    #[error("Field {field} cannot hold a {value_kind} value")]
    FieldTypeMismatch {
        /// The field being written
        field: String,
        /// The kind of value that was supplied
        value_kind: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
