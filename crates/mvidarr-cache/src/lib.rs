//! MVidarr Cache - Catalog persistence
//!
//! SQLite-based storage for:
//! - Catalog artists and videos with their per-server external ids
//! - The manual conflict queue
//!
//! ## Architecture
//!
//! This crate implements the `ICatalogRepository` and `IConflictQueue`
//! ports from `mvidarr-core` using SQLite as the storage backend. It is a
//! driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with schema setup
//! - [`SqliteCatalogRepository`] - Implementation of both ports
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use mvidarr_cache::{DatabasePool, SqliteCatalogRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/mvidarr/catalog.db")).await?;
//! let repo = SqliteCatalogRepository::new(pool.pool().clone());
//! // Use repo as ICatalogRepository and IConflictQueue...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteCatalogRepository;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
