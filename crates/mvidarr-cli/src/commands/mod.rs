//! CLI subcommands and the state they share

pub mod completions;
pub mod config;
pub mod conflicts;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use mvidarr_cache::{DatabasePool, SqliteCatalogRepository};
use mvidarr_core::config::Config;
use mvidarr_sync::SyncOrchestrator;
use tracing::debug;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Everything a subcommand needs from the global flags
pub struct CommandContext {
    pub config_path: PathBuf,
    pub config: Config,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn new(config_path: PathBuf, config: Config, format: OutputFormat, quiet: bool) -> Self {
        Self {
            config_path,
            config,
            format,
            quiet,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    /// Opens the catalog and builds an orchestrator over it
    ///
    /// No media server drivers are linked into this binary, so the
    /// orchestrator starts with an empty adapter registry.
    pub async fn open_orchestrator(&self) -> Result<SyncOrchestrator> {
        let pool = DatabasePool::from_config(&self.config.database)
            .await
            .with_context(|| {
                format!(
                    "Failed to open catalog at {}",
                    self.config.database.path.display()
                )
            })?;
        let repo = Arc::new(SqliteCatalogRepository::new(pool.pool().clone()));

        debug!(database = %self.config.database.path.display(), "Catalog opened");

        Ok(SyncOrchestrator::new(self.config.clone(), repo.clone(), repo))
    }
}
