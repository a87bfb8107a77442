//! Config command - View and manage MVidarr configuration
//!
//! Provides the `mvidarr config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON), credentials masked
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file path

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use mvidarr_core::config::{AdapterConfig, Config};
use mvidarr_core::domain::{ServerType, SyncField};
use tracing::info;

use super::CommandContext;

const MASK: &str = "********";

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show {
        /// Print tokens, API keys and passwords unmasked
        #[arg(long)]
        reveal: bool,
    },
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.strategy", "servers.plex.url")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show { reveal } => self.execute_show(ctx, *reveal),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => self.execute_path(ctx),
        }
    }

    fn execute_show(&self, ctx: &CommandContext, reveal: bool) -> Result<()> {
        let formatter = ctx.formatter();

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        let mut config = ctx.config.clone();
        if !reveal {
            mask_credentials(&mut config);
        }

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_set(&self, ctx: &CommandContext, key: &str, value: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;
        let mut config = Config::load_or_default(config_path);

        info!(key = %key, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for line in SUPPORTED_KEYS {
                    formatter.info(&format!("  {}", line));
                }
            }
            return Ok(());
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "errors": error_msgs,
                }));
            } else {
                formatter.error(&format!(
                    "Invalid value for '{}': {}",
                    key,
                    error_msgs.join("; ")
                ));
            }
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(config_path, yaml).context("Failed to write configuration file")?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {}", key));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        // Load explicitly: a parse error must be reported, not defaulted away
        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {}", e)
                } else {
                    "Configuration file not found. Using defaults.".to_string()
                };
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else if config_path.exists() {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                } else {
                    formatter.info(&format!(
                        "Configuration file not found at {}",
                        config_path.display()
                    ));
                    formatter.info(
                        "Using default configuration. Run 'mvidarr config set <key> <value>' to create one.",
                    );
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if ctx.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }

    fn execute_path(&self, ctx: &CommandContext) -> Result<()> {
        if ctx.is_json() {
            ctx.formatter().print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(())
    }
}

const SUPPORTED_KEYS: &[&str] = &[
    "sync.strategy                   - sequential|parallel|priority",
    "sync.priority_order             - comma-separated, e.g. jellyfin,plex,emby",
    "sync.default_direction          - from_server|to_server|bidirectional",
    "sync.auto_sync_enabled          - true|false",
    "sync.auto_sync_interval_minutes - Minutes between automatic syncs",
    "sync.similarity_threshold       - Track match threshold, 0.0 to 1.0",
    "sync.adapter_timeout_secs       - Seconds per media server call",
    "sync.fields.<field>             - true|false, e.g. sync.fields.rating",
    "conflicts.default_policy        - mvidarr_wins|server_wins|newest_wins|manual_review",
    "conflicts.fields.<field>        - Per-field policy override",
    "servers.<server>.enabled        - true|false",
    "servers.<server>.url            - Base URL",
    "servers.<server>.token          - Access token",
    "servers.<server>.api_key        - API key",
    "servers.<server>.username       - Login user",
    "servers.<server>.password       - Login password",
    "servers.<server>.user_id        - User whose play state is synced",
    "logging.level                   - trace|debug|info|warn|error",
    "logging.format                  - text|json",
    "database.path                   - SQLite catalog file",
];

/// Replaces every stored secret with a fixed mask
fn mask_credentials(config: &mut Config) {
    for server in ServerType::ALL {
        let settings: &mut AdapterConfig = config.servers.get_mut(server);
        for secret in [
            &mut settings.token,
            &mut settings.api_key,
            &mut settings.password,
        ] {
            if secret.is_some() {
                *secret = Some(MASK.to_string());
            }
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Expected true or false for {}", key),
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Apply a dot-notation key/value pair to a Config struct
///
/// Enum-like values are stored as given; `Config::validate` rejects bad ones
/// before anything is written.
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        // --- sync ---
        ["sync", "strategy"] => config.sync.strategy = value.to_string(),
        ["sync", "priority_order"] => {
            config.sync.priority_order = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        ["sync", "default_direction"] => config.sync.default_direction = value.to_string(),
        ["sync", "auto_sync_enabled"] => config.sync.auto_sync_enabled = parse_bool(key, value)?,
        ["sync", "auto_sync_interval_minutes"] => {
            config.sync.auto_sync_interval_minutes = value
                .parse::<u64>()
                .context("Expected a positive integer for sync.auto_sync_interval_minutes")?;
        }
        ["sync", "similarity_threshold"] => {
            config.sync.similarity_threshold = value
                .parse::<f64>()
                .context("Expected a number for sync.similarity_threshold")?;
        }
        ["sync", "adapter_timeout_secs"] => {
            config.sync.adapter_timeout_secs = value
                .parse::<u64>()
                .context("Expected a positive integer for sync.adapter_timeout_secs")?;
        }
        ["sync", "fields", field] => {
            let field: SyncField = field.parse()?;
            config.sync.fields.set(field, parse_bool(key, value)?);
        }

        // --- conflicts ---
        ["conflicts", "default_policy"] => config.conflicts.default_policy = value.to_string(),
        ["conflicts", "fields", field] => {
            let field: SyncField = field.parse()?;
            let rules = &mut config.conflicts.field_policies;
            rules.retain(|r| r.field != field.as_str());
            rules.push(mvidarr_core::config::FieldPolicyConfig {
                field: field.as_str().to_string(),
                policy: value.to_string(),
            });
        }

        // --- servers ---
        ["servers", server, setting] => {
            let server: ServerType = server.parse()?;
            let settings = config.servers.get_mut(server);
            match *setting {
                "enabled" => settings.enabled = parse_bool(key, value)?,
                "url" => settings.url = value.trim().to_string(),
                "token" => settings.token = optional(value),
                "api_key" => settings.api_key = optional(value),
                "username" => settings.username = optional(value),
                "password" => settings.password = optional(value),
                "user_id" => settings.user_id = optional(value),
                other => bail!("Unknown server setting '{}'", other),
            }
        }

        // --- logging ---
        ["logging", "level"] => config.logging.level = value.to_string(),
        ["logging", "format"] => config.logging.format = value.to_string(),

        // --- database ---
        ["database", "path"] => config.database.path = PathBuf::from(value),

        _ => bail!("Unknown configuration key '{}'", key),
    }

    Ok(())
}
