//! Database connection pool management
//!
//! Wraps SQLx's SqlitePool for the catalog database. File-backed pools use
//! WAL so parallel sync workers can read while one writes; the in-memory
//! pool backs tests.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use mvidarr_core::config::DatabaseConfig;

use crate::CacheError;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool of SQLite connections to the catalog database
///
/// - 5 connections, WAL journal and a 5-second busy timeout on disk
/// - a single connection in memory (each in-memory connection is its own database)
/// - foreign keys enforced in both modes
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the catalog database at `db_path`
    ///
    /// Parent directories are created and the schema migration is applied.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the file cannot be opened,
    /// or `CacheError::MigrationFailed` if the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to open catalog at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::migrate(&pool).await?;

        tracing::info!(path = %db_path.display(), "Catalog database opened");

        Ok(Self { pool })
    }

    /// Opens the database named in the `database` config section
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, CacheError> {
        Self::new(&config.path).await
    }

    /// Creates an empty in-memory catalog
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if SQLite cannot be initialised,
    /// or `CacheError::MigrationFailed` if the schema cannot be applied.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory catalog: {}", e))
            })?;

        sqlx::raw_sql("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await
            .map_err(|e| {
                CacheError::MigrationFailed(format!("Failed to enable foreign keys: {}", e))
            })?;

        Self::migrate(&pool).await?;

        tracing::debug!("In-memory catalog initialized");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded schema; every statement is idempotent
    async fn migrate(pool: &SqlitePool) -> Result<(), CacheError> {
        let schema = include_str!("migrations/20261019_initial.sql");
        sqlx::raw_sql(schema).execute(pool).await.map_err(|e| {
            CacheError::MigrationFailed(format!("Failed to apply catalog schema: {}", e))
        })?;

        tracing::debug!("Catalog schema up to date");
        Ok(())
    }
}
