//! Sync run results and execution settings
//!
//! [`SyncResult`] is produced fresh by every per-server run and never shared
//! between tasks. [`AggregateResult`] is built by a single caller once all
//! runs have finished; merging is commutative so completion order does not
//! matter.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conflict::Conflict;
use super::errors::DomainError;
use super::newtypes::ServerType;

/// Which way data flows during a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Pull artists and metadata from the media server
    FromServer,
    /// Link catalog entries to server items
    ToServer,
    /// Both directions plus field-level conflict resolution
    Bidirectional,
}

impl SyncDirection {
    pub fn pulls(&self) -> bool {
        matches!(self, SyncDirection::FromServer | SyncDirection::Bidirectional)
    }

    pub fn pushes(&self) -> bool {
        matches!(self, SyncDirection::ToServer | SyncDirection::Bidirectional)
    }
}

impl Display for SyncDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncDirection::FromServer => "from_server",
            SyncDirection::ToServer => "to_server",
            SyncDirection::Bidirectional => "bidirectional",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SyncDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "from_server" | "pull" => Ok(SyncDirection::FromServer),
            "to_server" | "push" => Ok(SyncDirection::ToServer),
            "bidirectional" | "both" => Ok(SyncDirection::Bidirectional),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown sync direction '{other}'"
            ))),
        }
    }
}

/// How the orchestrator schedules per-server runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// One server at a time, in registration order
    Sequential,
    /// All servers concurrently in a bounded pool
    Parallel,
    /// One server at a time, in configured priority order
    Priority,
}

impl Display for SyncStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStrategy::Sequential => "sequential",
            SyncStrategy::Parallel => "parallel",
            SyncStrategy::Priority => "priority",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SyncStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(SyncStrategy::Sequential),
            "parallel" => Ok(SyncStrategy::Parallel),
            "priority" => Ok(SyncStrategy::Priority),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown sync strategy '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Per-server result
// ============================================================================

/// Summary of one server's sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub server_type: ServerType,
    /// Artists and tracks looked at
    pub items_processed: u32,
    /// Catalog artists created from server data
    pub new_entities_created: u32,
    /// Writes that reached the media server (links and pushed fields)
    pub updates_to_server: u32,
    /// Catalog rows changed from server data (backfilled ids, pulled fields)
    pub updates_from_server: u32,
    /// Field differences resolved automatically
    pub conflicts_resolved: u32,
    /// Field differences sent to the manual queue
    pub manual_conflicts: Vec<Conflict>,
    /// Non-fatal and fatal errors, in the order they happened
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl SyncResult {
    /// Creates an empty result for a run that is starting now
    pub fn new(server_type: ServerType) -> Self {
        Self {
            server_type,
            items_processed: 0,
            new_entities_created: 0,
            updates_to_server: 0,
            updates_from_server: 0,
            conflicts_resolved: 0,
            manual_conflicts: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// A run that failed before processing anything
    pub fn failed(server_type: ServerType, error: impl Into<String>) -> Self {
        let mut result = Self::new(server_type);
        result.errors.push(error.into());
        result
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Catalog rows updated from the server
    pub fn updated_items(&self) -> u32 {
        self.updates_from_server
    }

    /// Records the elapsed time since `started_at`
    pub fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }
}

// ============================================================================
// Aggregate result
// ============================================================================

/// Counter totals summed across all server runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTotals {
    pub items_processed: u32,
    pub new_entities_created: u32,
    pub updates_to_server: u32,
    pub updates_from_server: u32,
    pub conflicts_resolved: u32,
    pub manual_conflicts: u32,
    pub errors: u32,
}

impl SyncTotals {
    fn add(&mut self, result: &SyncResult) {
        self.items_processed += result.items_processed;
        self.new_entities_created += result.new_entities_created;
        self.updates_to_server += result.updates_to_server;
        self.updates_from_server += result.updates_from_server;
        self.conflicts_resolved += result.conflicts_resolved;
        self.manual_conflicts += result.manual_conflicts.len() as u32;
        self.errors += result.errors.len() as u32;
    }
}

/// Combined report for one orchestrated sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// True when the sync ran and no run reported an error
    pub success: bool,
    /// True only on the busy response returned while another sync runs
    pub sync_in_progress: bool,
    pub strategy: Option<SyncStrategy>,
    pub direction: Option<SyncDirection>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Vec<SyncResult>,
    pub totals: SyncTotals,
    /// Every run's errors, prefixed with the server name
    pub errors: Vec<String>,
}

impl AggregateResult {
    /// The immediate answer for a sync requested while one is running
    pub fn busy() -> Self {
        Self {
            success: false,
            sync_in_progress: true,
            strategy: None,
            direction: None,
            started_at: Utc::now(),
            completed_at: None,
            results: Vec::new(),
            totals: SyncTotals::default(),
            errors: Vec::new(),
        }
    }

    /// Merges finished per-server results into one report
    pub fn merge(
        strategy: SyncStrategy,
        direction: SyncDirection,
        started_at: DateTime<Utc>,
        results: Vec<SyncResult>,
    ) -> Self {
        let mut totals = SyncTotals::default();
        let mut errors = Vec::new();

        for result in &results {
            totals.add(result);
            errors.extend(
                result
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", result.server_type, e)),
            );
        }

        Self {
            success: errors.is_empty(),
            sync_in_progress: false,
            strategy: Some(strategy),
            direction: Some(direction),
            started_at,
            completed_at: Some(Utc::now()),
            results,
            totals,
            errors,
        }
    }

    /// Returns the result for one server, if it took part
    pub fn result_for(&self, server: ServerType) -> Option<&SyncResult> {
        self.results.iter().find(|r| r.server_type == server)
    }
}
