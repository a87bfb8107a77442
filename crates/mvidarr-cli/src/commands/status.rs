//! Status command - Display orchestrator status
//!
//! Provides the `mvidarr status` CLI command which:
//! 1. Shows whether a sync is running and when the last full sync finished
//! 2. Shows auto-sync scheduling
//! 3. Lists each media server with its enabled/configured/registered state
//! 4. Counts pending manual conflicts

use anyhow::{Context, Result};
use clap::Args;
use mvidarr_sync::{AdapterStatus, OrchestratorStatus};
use tracing::info;

use super::CommandContext;
use crate::output::OutputFormatter;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Also print the full result of the last sync
    #[arg(long)]
    pub last_result: bool,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();

        let orchestrator = ctx.open_orchestrator().await?;
        let status = orchestrator.status().await;

        info!(
            in_progress = status.in_progress,
            pending = status.pending_manual_conflicts,
            "Showing status"
        );

        if ctx.is_json() {
            let mut json =
                serde_json::to_value(&status).context("Failed to serialize status to JSON")?;
            if !self.last_result {
                if let Some(obj) = json.as_object_mut() {
                    obj.remove("last_result");
                }
            }
            formatter.print_json(&json);
            return Ok(());
        }

        self.print_human(&status, &*formatter);
        Ok(())
    }

    fn print_human(&self, status: &OrchestratorStatus, formatter: &dyn OutputFormatter) {
        formatter.success("MVidarr Sync Status");
        formatter.info("");

        formatter.info(&format!(
            "Sync running: {}",
            if status.in_progress { "yes" } else { "no" }
        ));
        match status.last_full_sync {
            Some(time) => formatter.info(&format!(
                "Last full sync: {}",
                time.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            None => formatter.info("Last full sync: Never"),
        }

        if status.auto_sync_enabled {
            match status.next_auto_sync_due {
                Some(due) => formatter.info(&format!(
                    "Auto-sync: enabled, next due {}",
                    due.format("%Y-%m-%d %H:%M:%S UTC")
                )),
                None => formatter.info("Auto-sync: enabled, due now"),
            }
        } else {
            formatter.info("Auto-sync: disabled");
        }

        formatter.info("");
        formatter.info("Server     Enabled  Configured  Driver  Connection");
        formatter.info("---------- -------- ----------- ------- ----------");
        for adapter in &status.adapters {
            formatter.info(&server_row(adapter));
        }

        formatter.info("");
        if status.pending_manual_conflicts > 0 {
            formatter.warn(&format!(
                "{} conflict{} awaiting review. Run 'mvidarr conflicts list'.",
                status.pending_manual_conflicts,
                if status.pending_manual_conflicts == 1 { "" } else { "s" }
            ));
        } else {
            formatter.info("No conflicts awaiting review");
        }

        if self.last_result {
            if let Some(last) = &status.last_result {
                formatter.info("");
                formatter.info(&format!(
                    "Last run: {} processed, {} created, {} errors",
                    last.totals.items_processed,
                    last.totals.new_entities_created,
                    last.totals.errors
                ));
                for error in &last.errors {
                    formatter.info(&format!("  {}", error));
                }
            }
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// One table row for a media server
fn server_row(adapter: &AdapterStatus) -> String {
    let connection = if adapter.connected {
        match (&adapter.server_name, &adapter.version) {
            (Some(name), Some(version)) => format!("{} {}", name, version),
            (Some(name), None) => name.clone(),
            _ => "connected".to_string(),
        }
    } else if let Some(error) = &adapter.error {
        format!("error: {}", error)
    } else {
        "-".to_string()
    };

    format!(
        "{:<10} {:<8} {:<11} {:<7} {}",
        adapter.server_type.as_str(),
        yes_no(adapter.enabled),
        yes_no(adapter.configured),
        yes_no(adapter.registered),
        connection
    )
}
