//! Conflicts command - Manage the manual conflict queue
//!
//! Provides the `mvidarr conflicts` CLI command which:
//! 1. Lists queued field conflicts, oldest first
//! 2. Shows one conflict with both values and the reason it was queued
//! 3. Resolves a conflict by keeping the catalog or the server value
//!
//! Conflict ids may be abbreviated to any unique prefix.

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use mvidarr_core::domain::{Conflict, FieldValue, ManualDecision};
use tracing::info;

use super::CommandContext;

/// Conflicts subcommands
#[derive(Debug, Subcommand)]
pub enum ConflictsCommand {
    /// List conflicts awaiting a decision
    List,
    /// Show one conflict in detail
    Show {
        /// Conflict ID or unique prefix
        id: String,
    },
    /// Resolve a conflict
    Resolve {
        /// Conflict ID or unique prefix
        id: String,
        /// Which value to keep
        #[arg(long, value_enum)]
        keep: KeepSide,
    },
}

/// Side chosen by `conflicts resolve --keep`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeepSide {
    /// Keep the MVidarr catalog value and push it to the server
    Internal,
    /// Take the media server value into the catalog
    External,
}

impl From<KeepSide> for ManualDecision {
    fn from(side: KeepSide) -> Self {
        match side {
            KeepSide::Internal => ManualDecision::KeepInternal,
            KeepSide::External => ManualDecision::KeepExternal,
        }
    }
}

impl ConflictsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConflictsCommand::List => self.execute_list(ctx).await,
            ConflictsCommand::Show { id } => self.execute_show(ctx, id).await,
            ConflictsCommand::Resolve { id, keep } => {
                self.execute_resolve(ctx, id, (*keep).into()).await
            }
        }
    }

    async fn execute_list(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let orchestrator = ctx.open_orchestrator().await?;

        let conflicts = orchestrator.list_manual_conflicts().await?;

        info!(count = conflicts.len(), "Retrieved manual conflicts");

        if ctx.is_json() {
            let json = serde_json::json!({
                "count": conflicts.len(),
                "conflicts": conflicts,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if conflicts.is_empty() {
            formatter.success("No conflicts awaiting review");
            return Ok(());
        }

        formatter.success(&format!(
            "{} conflict{} awaiting review",
            conflicts.len(),
            if conflicts.len() == 1 { "" } else { "s" }
        ));
        formatter.info("");
        formatter.info("  ID (short)     Server   Field           MVidarr        Server         Title");
        formatter.info("  -------------- -------- --------------- -------------- -------------- -----");

        for conflict in &conflicts {
            formatter.info(&format!(
                "  {:<14} {:<8} {:<15} {:<14} {:<14} {}",
                truncate_id(conflict.id().to_string(), 14),
                conflict.server_type().as_str(),
                conflict.field().as_str(),
                truncate_id(display_value(conflict.internal_value()), 14),
                truncate_id(display_value(conflict.external_value()), 14),
                conflict.title()
            ));
        }

        formatter.info("");
        formatter.info("Use 'mvidarr conflicts show <id>' for details.");
        formatter.info("Use 'mvidarr conflicts resolve <id> --keep <internal|external>' to resolve.");

        Ok(())
    }

    async fn execute_show(&self, ctx: &CommandContext, id: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let orchestrator = ctx.open_orchestrator().await?;

        let conflicts = orchestrator.list_manual_conflicts().await?;
        let conflict = match find_by_prefix(&conflicts, id) {
            Ok(c) => c,
            Err(msg) => {
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({"success": false, "error": msg}));
                } else {
                    formatter.error(&msg);
                    formatter.info("Use 'mvidarr conflicts list' to see queued conflicts.");
                }
                return Ok(());
            }
        };

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(conflict)?);
            return Ok(());
        }

        formatter.success(&format!("Conflict Details: {}", conflict.id()));
        formatter.info("");
        formatter.info(&format!("Video:       {} ({})", conflict.title(), conflict.video_id()));
        formatter.info(&format!(
            "Server:      {} item {}",
            conflict.server_type(),
            conflict.external_item_id()
        ));
        formatter.info(&format!("Field:       {}", conflict.field()));
        formatter.info(&format!("MVidarr:     {}", display_value(conflict.internal_value())));
        formatter.info(&format!("Server:      {}", display_value(conflict.external_value())));
        formatter.info(&format!("Policy:      {}", conflict.policy()));
        formatter.info(&format!("Reason:      {}", conflict.reason()));
        formatter.info(&format!(
            "Detected:    {}",
            conflict.detected_at().format("%Y-%m-%d %H:%M:%S UTC")
        ));

        formatter.info("");
        formatter.info("To resolve, run:");
        formatter.info(&format!(
            "  mvidarr conflicts resolve {} --keep <internal|external>",
            truncate_id(conflict.id().to_string(), 14)
        ));

        Ok(())
    }

    async fn execute_resolve(
        &self,
        ctx: &CommandContext,
        id: &str,
        decision: ManualDecision,
    ) -> Result<()> {
        let formatter = ctx.formatter();
        let orchestrator = ctx.open_orchestrator().await?;

        let conflicts = orchestrator.list_manual_conflicts().await?;
        let conflict_id = match find_by_prefix(&conflicts, id) {
            Ok(c) => *c.id(),
            Err(msg) => {
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({"success": false, "error": msg}));
                } else {
                    formatter.error(&msg);
                }
                return Ok(());
            }
        };

        info!(conflict_id = %conflict_id, decision = %decision, "Resolving conflict");

        match orchestrator.resolve_manual_conflict(&conflict_id, decision).await {
            Ok(resolved) => {
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "conflict_id": conflict_id.to_string(),
                        "decision": decision.to_string(),
                        "field": resolved.field().as_str(),
                    }));
                } else {
                    formatter.success(&format!(
                        "Conflict {} resolved ({}): {} on '{}'",
                        truncate_id(conflict_id.to_string(), 14),
                        decision,
                        resolved.field(),
                        resolved.title()
                    ));
                }
            }
            Err(e) => {
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": false,
                        "conflict_id": conflict_id.to_string(),
                        "error": e.to_string(),
                    }));
                } else {
                    formatter.error(&format!("Failed to resolve conflict: {}", e));
                    formatter.info("The conflict stays queued.");
                }
            }
        }

        Ok(())
    }
}

/// Finds the one conflict whose id equals or starts with `prefix`
fn find_by_prefix<'a>(conflicts: &'a [Conflict], prefix: &str) -> Result<&'a Conflict, String> {
    let prefix = prefix.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        return Err("Conflict ID must not be empty".to_string());
    }

    let mut matches = conflicts
        .iter()
        .filter(|c| c.id().to_string().starts_with(&prefix));

    match (matches.next(), matches.next()) {
        (Some(c), None) => Ok(c),
        (None, _) => Err(format!("No queued conflict found with ID: {}", prefix)),
        (Some(_), Some(_)) => Err(format!(
            "ID prefix '{}' matches more than one conflict; use more characters",
            prefix
        )),
    }
}

fn display_value(value: Option<&FieldValue>) -> String {
    value.map_or_else(|| "(unset)".to_string(), |v| v.to_string())
}

/// Truncate a string for display, showing only the first N characters
fn truncate_id(id: String, max_len: usize) -> String {
    if id.chars().count() <= max_len {
        id
    } else {
        let head: String = id.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
