//! Configuration module for MVidarr sync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{ConflictPolicy, ServerType, SyncDirection, SyncField, SyncStrategy};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for MVidarr sync.
///
/// Every section falls back to its defaults when missing from the file, so a
/// config that only lists servers is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub conflicts: ConflictsConfig,
    pub servers: ServersConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Execution strategy: `sequential`, `parallel`, or `priority`.
    pub strategy: String,
    /// Server order used by the `priority` strategy; unlisted servers run last.
    pub priority_order: Vec<String>,
    /// Direction used when a sync is triggered without one.
    pub default_direction: String,
    /// Whether periodic syncs are due at all.
    pub auto_sync_enabled: bool,
    /// Minutes between automatic full syncs.
    pub auto_sync_interval_minutes: u64,
    /// Minimum similarity score (0..=1) for a track pair to match.
    pub similarity_threshold: f64,
    /// Upper bound in seconds for any single adapter call.
    pub adapter_timeout_secs: u64,
    /// Fields subject to bidirectional conflict resolution.
    pub fields: SyncFieldsConfig,
}

/// Per-field sync toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncFieldsConfig {
    pub play_count: bool,
    pub last_played: bool,
    pub rating: bool,
    pub favorite: bool,
    pub watched_status: bool,
    pub tags: bool,
    pub notes: bool,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Policy for fields without an override: `mvidarr_wins`, `server_wins`,
    /// `newest_wins`, or `manual_review`.
    pub default_policy: String,
    /// Per-field policy overrides.
    pub field_policies: Vec<FieldPolicyConfig>,
}

/// A policy override for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicyConfig {
    pub field: String,
    pub policy: String,
}

/// Connection settings for every supported media server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServersConfig {
    pub plex: AdapterConfig,
    pub jellyfin: AdapterConfig,
    pub emby: AdapterConfig,
}

/// Connection settings for one media server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub enabled: bool,
    /// Base URL of the server, e.g. `http://10.0.0.5:32400`.
    pub url: String,
    /// Plex-style access token.
    pub token: Option<String>,
    /// Jellyfin/Emby API key.
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// User whose play state is synchronized.
    pub user_id: Option<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Catalog database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite catalog database.
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/mvidarr/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("mvidarr")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Typed accessors
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Parsed strategy, falling back to sequential for unknown values.
    pub fn strategy(&self) -> SyncStrategy {
        self.strategy.parse().unwrap_or(SyncStrategy::Sequential)
    }

    /// Parsed default direction, falling back to from-server.
    pub fn default_direction(&self) -> SyncDirection {
        self.default_direction
            .parse()
            .unwrap_or(SyncDirection::FromServer)
    }

    /// Parsed priority list; unknown server names are dropped.
    pub fn priority_order(&self) -> Vec<ServerType> {
        self.priority_order
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }
}

impl SyncFieldsConfig {
    /// Whether `field` is synchronized
    pub fn is_enabled(&self, field: SyncField) -> bool {
        match field {
            SyncField::PlayCount => self.play_count,
            SyncField::LastPlayed => self.last_played,
            SyncField::Rating => self.rating,
            SyncField::Favorite => self.favorite,
            SyncField::WatchedStatus => self.watched_status,
            SyncField::Tags => self.tags,
            SyncField::Notes => self.notes,
        }
    }

    /// Enabled fields in diff order
    pub fn enabled_fields(&self) -> Vec<SyncField> {
        SyncField::ALL
            .into_iter()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }

    /// Toggles one field
    pub fn set(&mut self, field: SyncField, enabled: bool) {
        let slot = match field {
            SyncField::PlayCount => &mut self.play_count,
            SyncField::LastPlayed => &mut self.last_played,
            SyncField::Rating => &mut self.rating,
            SyncField::Favorite => &mut self.favorite,
            SyncField::WatchedStatus => &mut self.watched_status,
            SyncField::Tags => &mut self.tags,
            SyncField::Notes => &mut self.notes,
        };
        *slot = enabled;
    }
}

impl ServersConfig {
    /// Settings for one server type
    pub fn get(&self, server: ServerType) -> &AdapterConfig {
        match server {
            ServerType::Plex => &self.plex,
            ServerType::Jellyfin => &self.jellyfin,
            ServerType::Emby => &self.emby,
        }
    }

    pub fn get_mut(&mut self, server: ServerType) -> &mut AdapterConfig {
        match server {
            ServerType::Plex => &mut self.plex,
            ServerType::Jellyfin => &mut self.jellyfin,
            ServerType::Emby => &mut self.emby,
        }
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl AdapterConfig {
    /// Has a URL and at least one usable credential form.
    pub fn is_configured(&self) -> bool {
        let has_url = !self.url.trim().is_empty();
        let has_credentials = non_empty(&self.token)
            || non_empty(&self.api_key)
            || (non_empty(&self.username) && non_empty(&self.password));
        has_url && has_credentials
    }

    /// Enabled and configured.
    pub fn is_candidate(&self) -> bool {
        self.enabled && self.is_configured()
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: "sequential".to_string(),
            priority_order: ServerType::ALL.iter().map(|s| s.to_string()).collect(),
            default_direction: "from_server".to_string(),
            auto_sync_enabled: false,
            auto_sync_interval_minutes: 60,
            similarity_threshold: 0.8,
            adapter_timeout_secs: 30,
            fields: SyncFieldsConfig::default(),
        }
    }
}

impl Default for SyncFieldsConfig {
    fn default() -> Self {
        let mut fields = Self {
            play_count: false,
            last_played: false,
            rating: false,
            favorite: false,
            watched_status: false,
            tags: false,
            notes: false,
        };
        for field in SyncField::ALL {
            fields.set(field, field.enabled_by_default());
        }
        fields
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_policy: "manual_review".to_string(),
            field_policies: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("mvidarr")
                .join("catalog.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.adapter_timeout_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Valid values for `sync.strategy`.
const VALID_STRATEGIES: &[&str] = &["sequential", "parallel", "priority"];

/// Valid values for `sync.default_direction`.
const VALID_DIRECTIONS: &[&str] = &["from_server", "to_server", "bidirectional"];

/// Valid values for conflict policies.
pub const VALID_POLICIES: &[&str] = &["mvidarr_wins", "server_wins", "newest_wins", "manual_review"];

/// Parses a policy name as written in the config file.
pub fn parse_policy(name: &str) -> Option<ConflictPolicy> {
    match name {
        "mvidarr_wins" => Some(ConflictPolicy::MvidarrWins),
        "server_wins" => Some(ConflictPolicy::ServerWins),
        "newest_wins" => Some(ConflictPolicy::NewestWins),
        "manual_review" | "manual" => Some(ConflictPolicy::ManualReview),
        _ => None,
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if !VALID_STRATEGIES.contains(&self.sync.strategy.as_str()) {
            errors.push(ValidationError {
                field: "sync.strategy".into(),
                message: format!(
                    "invalid strategy '{}'; valid options: {}",
                    self.sync.strategy,
                    VALID_STRATEGIES.join(", ")
                ),
            });
        }
        if !VALID_DIRECTIONS.contains(&self.sync.default_direction.as_str()) {
            errors.push(ValidationError {
                field: "sync.default_direction".into(),
                message: format!(
                    "invalid direction '{}'; valid options: {}",
                    self.sync.default_direction,
                    VALID_DIRECTIONS.join(", ")
                ),
            });
        }
        for name in &self.sync.priority_order {
            if name.parse::<ServerType>().is_err() {
                errors.push(ValidationError {
                    field: "sync.priority_order".into(),
                    message: format!("unknown server '{name}'"),
                });
            }
        }
        if self.sync.auto_sync_interval_minutes == 0 {
            errors.push(ValidationError {
                field: "sync.auto_sync_interval_minutes".into(),
                message: "must be greater than 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.sync.similarity_threshold) {
            errors.push(ValidationError {
                field: "sync.similarity_threshold".into(),
                message: "must be in range 0.0..=1.0".into(),
            });
        }
        if self.sync.adapter_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "sync.adapter_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- conflicts ---
        if parse_policy(&self.conflicts.default_policy).is_none() {
            errors.push(ValidationError {
                field: "conflicts.default_policy".into(),
                message: format!(
                    "invalid policy '{}'; valid options: {}",
                    self.conflicts.default_policy,
                    VALID_POLICIES.join(", ")
                ),
            });
        }
        for (i, rule) in self.conflicts.field_policies.iter().enumerate() {
            if rule.field.parse::<SyncField>().is_err() {
                errors.push(ValidationError {
                    field: format!("conflicts.field_policies[{i}].field"),
                    message: format!("unknown field '{}'", rule.field),
                });
            }
            if parse_policy(&rule.policy).is_none() {
                errors.push(ValidationError {
                    field: format!("conflicts.field_policies[{i}].policy"),
                    message: format!(
                        "invalid policy '{}'; valid options: {}",
                        rule.policy,
                        VALID_POLICIES.join(", ")
                    ),
                });
            }
        }

        // --- servers ---
        for server in ServerType::ALL {
            let adapter = self.servers.get(server);
            if adapter.enabled && !adapter.is_configured() {
                errors.push(ValidationError {
                    field: format!("servers.{server}"),
                    message: "enabled but missing url or credentials".into(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use mvidarr_core::config::ConfigBuilder;
/// use mvidarr_core::domain::ServerType;
///
/// let config = ConfigBuilder::new()
///     .sync_strategy("parallel")
///     .server_url(ServerType::Plex, "http://10.0.0.5:32400")
///     .server_token(ServerType::Plex, "abc")
///     .server_enabled(ServerType::Plex, true)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.sync.strategy = strategy.into();
        self
    }

    pub fn sync_priority_order(mut self, order: &[ServerType]) -> Self {
        self.config.sync.priority_order = order.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn sync_default_direction(mut self, direction: impl Into<String>) -> Self {
        self.config.sync.default_direction = direction.into();
        self
    }

    pub fn auto_sync(mut self, enabled: bool, interval_minutes: u64) -> Self {
        self.config.sync.auto_sync_enabled = enabled;
        self.config.sync.auto_sync_interval_minutes = interval_minutes;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.config.sync.similarity_threshold = threshold;
        self
    }

    pub fn adapter_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.adapter_timeout_secs = seconds;
        self
    }

    pub fn sync_field(mut self, field: SyncField, enabled: bool) -> Self {
        self.config.sync.fields.set(field, enabled);
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_policy(mut self, policy: impl Into<String>) -> Self {
        self.config.conflicts.default_policy = policy.into();
        self
    }

    pub fn conflicts_field_policy(
        mut self,
        field: impl Into<String>,
        policy: impl Into<String>,
    ) -> Self {
        self.config.conflicts.field_policies.push(FieldPolicyConfig {
            field: field.into(),
            policy: policy.into(),
        });
        self
    }

    // --- servers ---

    pub fn server_enabled(mut self, server: ServerType, enabled: bool) -> Self {
        self.config.servers.get_mut(server).enabled = enabled;
        self
    }

    pub fn server_url(mut self, server: ServerType, url: impl Into<String>) -> Self {
        self.config.servers.get_mut(server).url = url.into();
        self
    }

    pub fn server_token(mut self, server: ServerType, token: impl Into<String>) -> Self {
        self.config.servers.get_mut(server).token = Some(token.into());
        self
    }

    pub fn server_api_key(mut self, server: ServerType, api_key: impl Into<String>) -> Self {
        self.config.servers.get_mut(server).api_key = Some(api_key.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
