//! Multi-server sync orchestration
//!
//! The [`SyncOrchestrator`] owns the adapter registry, picks the candidate
//! servers for a run, executes one [`SyncEngine`] run per server under the
//! configured strategy and merges the per-server results.
//!
//! ## Concurrency
//!
//! ```text
//! sync_all ──→ try_begin ──busy──→ AggregateResult::busy()
//!                 │
//!            candidates ──→ sequential / priority: spawn + await one by one
//!                      └──→ parallel: spawn all, Semaphore(ServerType::ALL.len())
//!                 │
//!            join all ──→ AggregateResult::merge ──→ finish (clears guard)
//! ```
//!
//! Each run is its own tokio task returning an owned [`SyncResult`]; a panic
//! inside one surfaces as that server's error only. The in-progress flag and
//! the last-sync bookkeeping live behind one mutex that is never held across
//! an await point.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use mvidarr_conflict::{ConflictError, ResolveManualConflictUseCase};
use mvidarr_core::config::Config;
use mvidarr_core::domain::{
    AggregateResult, Conflict, ConflictId, ManualDecision, ServerType, SyncDirection,
    SyncResult, SyncStrategy,
};
use mvidarr_core::ports::{
    ICatalogRepository, IConflictQueue, IMediaServerAdapter, PlayHistoryEntry,
};

use crate::engine::{with_timeout, SyncEngine};
use crate::SyncError;

// ============================================================================
// Status types
// ============================================================================

/// Per-server view for status reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterStatus {
    pub server_type: ServerType,
    pub enabled: bool,
    /// URL and at least one credential form present
    pub configured: bool,
    /// A driver was registered for this server type
    pub registered: bool,
    pub connected: bool,
    pub server_name: Option<String>,
    pub version: Option<String>,
    pub error: Option<String>,
}

/// Snapshot returned by [`SyncOrchestrator::status`]
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub in_progress: bool,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub last_result: Option<AggregateResult>,
    pub auto_sync_enabled: bool,
    /// When the next automatic sync is due; `None` if disabled or never synced
    pub next_auto_sync_due: Option<DateTime<Utc>>,
    pub pending_manual_conflicts: u64,
    pub adapters: Vec<AdapterStatus>,
}

/// Outcome of one library scan request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryScanOutcome {
    pub server_type: ServerType,
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Run state
// ============================================================================

#[derive(Debug, Default)]
struct RunState {
    in_progress: bool,
    last_full_sync: Option<DateTime<Utc>>,
    last_result: Option<AggregateResult>,
}

/// Clears the in-progress flag when the run ends, however it ends
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).in_progress = false;
    }
}

/// Locks the run state, recovering the data if a holder panicked
fn lock(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Fans sync runs out over the registered media servers
///
/// Constructed once at process start with its collaborators injected;
/// adapters are added with [`register_adapter`](Self::register_adapter).
pub struct SyncOrchestrator {
    config: Config,
    engine: Arc<SyncEngine>,
    queue: Arc<dyn IConflictQueue>,
    manual: ResolveManualConflictUseCase,
    /// Registered drivers in registration order, at most one per server type
    adapters: RwLock<Vec<Arc<dyn IMediaServerAdapter>>>,
    state: Mutex<RunState>,
}

impl SyncOrchestrator {
    pub fn new(
        config: Config,
        catalog: Arc<dyn ICatalogRepository>,
        queue: Arc<dyn IConflictQueue>,
    ) -> Self {
        let engine = Arc::new(SyncEngine::from_config(catalog.clone(), queue.clone(), &config));
        let manual = ResolveManualConflictUseCase::new(catalog, queue.clone())
            .with_write_timeout(engine.call_timeout());

        info!(
            strategy = %config.sync.strategy(),
            threshold = config.sync.similarity_threshold,
            fields = config.sync.fields.enabled_fields().len(),
            "Sync orchestrator created"
        );

        Self {
            config,
            engine,
            queue,
            manual,
            adapters: RwLock::new(Vec::new()),
            state: Mutex::new(RunState::default()),
        }
    }

    // ========================================================================
    // Adapter registry
    // ========================================================================

    /// Registers the driver for one server type
    ///
    /// A second registration for the same type replaces the first but keeps
    /// its position in the registration order.
    pub fn register_adapter(&self, adapter: Arc<dyn IMediaServerAdapter>) {
        let server = adapter.server_type();
        let mut adapters = self
            .adapters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match adapters.iter().position(|a| a.server_type() == server) {
            Some(index) => {
                adapters[index] = adapter;
                info!(%server, "Adapter replaced");
            }
            None => {
                adapters.push(adapter);
                info!(%server, "Adapter registered");
            }
        }
    }

    /// Registered drivers, in registration order
    pub fn registered(&self) -> Vec<Arc<dyn IMediaServerAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn adapter(&self, server: ServerType) -> Option<Arc<dyn IMediaServerAdapter>> {
        self.registered()
            .into_iter()
            .find(|a| a.server_type() == server)
    }

    /// Server types that are enabled, configured and match `filter`
    ///
    /// Enabled servers that lack credentials are skipped with a warning.
    pub fn candidate_servers(&self, filter: Option<ServerType>) -> Vec<ServerType> {
        ServerType::ALL
            .into_iter()
            .filter(|server| filter.map_or(true, |f| f == *server))
            .filter(|server| {
                let settings = self.config.servers.get(*server);
                if settings.enabled && !settings.is_configured() {
                    warn!(%server, "Server enabled but missing URL or credentials, skipping");
                }
                settings.is_candidate()
            })
            .collect()
    }

    /// Orders candidates for execution
    ///
    /// Registration order for sequential and parallel; configured priority
    /// order for priority, with unlisted servers last. Candidates without a
    /// registered driver follow in canonical order.
    fn execution_order(&self, candidates: &[ServerType]) -> Vec<ServerType> {
        let mut ordered: Vec<ServerType> = self
            .registered()
            .iter()
            .map(|a| a.server_type())
            .filter(|s| candidates.contains(s))
            .collect();
        let unregistered: Vec<ServerType> = candidates
            .iter()
            .filter(|s| !ordered.contains(s))
            .copied()
            .collect();
        ordered.extend(unregistered);

        if self.config.sync.strategy() == SyncStrategy::Priority {
            let priority = self.config.sync.priority_order();
            // stable sort keeps registration order among unlisted servers
            ordered.sort_by_key(|s| priority.iter().position(|p| p == s).unwrap_or(usize::MAX));
        }
        ordered
    }

    // ========================================================================
    // Sync entry points
    // ========================================================================

    /// Syncs every candidate server
    ///
    /// Returns [`AggregateResult::busy`] at once if a sync is already
    /// running. Adapter failures are folded into the result; this never
    /// fails.
    #[tracing::instrument(skip(self))]
    pub async fn sync_all(
        &self,
        direction: SyncDirection,
        filter: Option<ServerType>,
    ) -> AggregateResult {
        let Some(guard) = self.try_begin() else {
            info!("Sync requested while another is running");
            return AggregateResult::busy();
        };

        let started_at = Utc::now();
        let candidates = self.candidate_servers(filter);
        let strategy = self.config.sync.strategy();

        info!(
            %strategy,
            %direction,
            candidates = candidates.len(),
            "Starting sync of all servers"
        );

        let results = self.execute(strategy, direction, &candidates).await;
        let aggregate = AggregateResult::merge(strategy, direction, started_at, results);
        self.finish(&aggregate, filter.is_none());
        drop(guard);

        aggregate
    }

    /// Syncs a single server, sharing the single-flight guard with [`sync_all`](Self::sync_all)
    ///
    /// A server that is not a candidate yields a failed result naming why.
    #[tracing::instrument(skip(self))]
    pub async fn sync_adapter(
        &self,
        server: ServerType,
        direction: SyncDirection,
    ) -> AggregateResult {
        let Some(guard) = self.try_begin() else {
            info!(%server, "Sync requested while another is running");
            return AggregateResult::busy();
        };

        let started_at = Utc::now();
        let strategy = SyncStrategy::Sequential;
        let results = if self.candidate_servers(Some(server)).is_empty() {
            let msg = format!("{server} is not enabled and configured");
            warn!(%msg);
            vec![SyncResult::failed(server, msg)]
        } else {
            self.execute(strategy, direction, &[server]).await
        };

        let aggregate = AggregateResult::merge(strategy, direction, started_at, results);
        self.finish(&aggregate, false);
        drop(guard);

        aggregate
    }

    /// Check-and-set of the in-progress flag
    fn try_begin(&self) -> Option<RunGuard<'_>> {
        let mut state = lock(&self.state);
        if state.in_progress {
            return None;
        }
        state.in_progress = true;
        Some(RunGuard { state: &self.state })
    }

    fn finish(&self, aggregate: &AggregateResult, full: bool) {
        let mut state = lock(&self.state);
        if full {
            state.last_full_sync = aggregate.completed_at;
        }
        state.last_result = Some(aggregate.clone());

        info!(
            success = aggregate.success,
            created = aggregate.totals.new_entities_created,
            errors = aggregate.errors.len(),
            "Sync finished"
        );
    }

    async fn execute(
        &self,
        strategy: SyncStrategy,
        direction: SyncDirection,
        candidates: &[ServerType],
    ) -> Vec<SyncResult> {
        let order = self.execution_order(candidates);
        debug!(?order, %strategy, "Execution order");

        match strategy {
            SyncStrategy::Sequential | SyncStrategy::Priority => {
                let mut results = Vec::with_capacity(order.len());
                for server in order {
                    results.push(self.run_one(server, direction).await);
                }
                results
            }
            SyncStrategy::Parallel => self.run_parallel(order, direction).await,
        }
    }

    /// Runs one server in its own task and waits for it
    async fn run_one(&self, server: ServerType, direction: SyncDirection) -> SyncResult {
        let Some(adapter) = self.adapter(server) else {
            return SyncResult::failed(server, SyncError::AdapterNotRegistered(server).to_string());
        };
        let engine = self.engine.clone();
        let handle = tokio::spawn(async move { engine.run(adapter.as_ref(), direction, None).await });
        join_result(server, handle.await)
    }

    async fn run_parallel(&self, order: Vec<ServerType>, direction: SyncDirection) -> Vec<SyncResult> {
        let semaphore = Arc::new(Semaphore::new(ServerType::ALL.len()));
        let mut handles = Vec::with_capacity(order.len());

        for server in order {
            let Some(adapter) = self.adapter(server) else {
                handles.push((server, None));
                continue;
            };
            let engine = self.engine.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                engine.run(adapter.as_ref(), direction, None).await
            });
            handles.push((server, Some(handle)));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (server, handle) in handles {
            results.push(match handle {
                Some(handle) => join_result(server, handle.await),
                None => SyncResult::failed(server, SyncError::AdapterNotRegistered(server).to_string()),
            });
        }
        results
    }

    // ========================================================================
    // Scheduling and status
    // ========================================================================

    /// Whether an automatic full sync is due at `now`
    pub fn should_auto_sync(&self, now: DateTime<Utc>) -> bool {
        if !self.config.sync.auto_sync_enabled {
            return false;
        }
        let state = lock(&self.state);
        if state.in_progress {
            return false;
        }
        match state.last_full_sync {
            None => true,
            Some(last) => now - last >= self.auto_sync_interval(),
        }
    }

    fn auto_sync_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.config.sync.auto_sync_interval_minutes as i64)
    }

    pub fn is_in_progress(&self) -> bool {
        lock(&self.state).in_progress
    }

    pub fn last_full_sync(&self) -> Option<DateTime<Utc>> {
        lock(&self.state).last_full_sync
    }

    /// Aggregate status: run state, queue size and per-server connectivity
    ///
    /// Connectivity is probed only for candidate servers with a driver.
    pub async fn status(&self) -> OrchestratorStatus {
        let (in_progress, last_full_sync, last_result) = {
            let state = lock(&self.state);
            (state.in_progress, state.last_full_sync, state.last_result.clone())
        };

        let mut adapters = Vec::with_capacity(ServerType::ALL.len());
        for server in ServerType::ALL {
            adapters.push(self.adapter_status(server).await);
        }

        let pending_manual_conflicts = match self.queue.count().await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "Failed to count manual conflicts");
                0
            }
        };

        let auto_sync_enabled = self.config.sync.auto_sync_enabled;
        let next_auto_sync_due = if auto_sync_enabled {
            last_full_sync.map(|last| last + self.auto_sync_interval())
        } else {
            None
        };

        OrchestratorStatus {
            in_progress,
            last_full_sync,
            last_result,
            auto_sync_enabled,
            next_auto_sync_due,
            pending_manual_conflicts,
            adapters,
        }
    }

    async fn adapter_status(&self, server: ServerType) -> AdapterStatus {
        let settings = self.config.servers.get(server);
        let adapter = self.adapter(server);
        let mut status = AdapterStatus {
            server_type: server,
            enabled: settings.enabled,
            configured: settings.is_configured(),
            registered: adapter.is_some(),
            connected: false,
            server_name: None,
            version: None,
            error: None,
        };

        let Some(adapter) = adapter.filter(|_| settings.is_candidate()) else {
            return status;
        };

        match with_timeout(
            self.engine.call_timeout(),
            server,
            "test_connection",
            adapter.test_connection(),
        )
        .await
        {
            Ok(probe) => {
                status.connected = probe.connected;
                status.server_name = probe.server_name;
                status.version = probe.version;
                status.error = probe.error;
            }
            Err(err) => status.error = Some(format!("{err:#}")),
        }
        status
    }

    // ========================================================================
    // Manual conflicts
    // ========================================================================

    /// Pending manual conflicts, oldest first
    pub async fn list_manual_conflicts(&self) -> Result<Vec<Conflict>, ConflictError> {
        self.manual.list().await
    }

    /// Applies a decision to one queued conflict
    ///
    /// Keeping the catalog value needs the registered driver of the
    /// conflict's server.
    pub async fn resolve_manual_conflict(
        &self,
        id: &ConflictId,
        decision: ManualDecision,
    ) -> Result<Conflict, ConflictError> {
        let conflict = self
            .queue
            .get(id)
            .await?
            .ok_or_else(|| ConflictError::NotFound(id.to_string()))?;
        let adapter = self.adapter(conflict.server_type());

        self.manual
            .resolve(id, decision, adapter.as_deref())
            .await
    }

    // ========================================================================
    // Scans and play history
    // ========================================================================

    /// Asks each candidate server to rescan its libraries
    pub async fn trigger_library_scans(&self, filter: Option<ServerType>) -> Vec<LibraryScanOutcome> {
        let mut outcomes = Vec::new();

        for server in self.execution_order(&self.candidate_servers(filter)) {
            let Some(adapter) = self.adapter(server) else {
                outcomes.push(LibraryScanOutcome {
                    server_type: server,
                    success: false,
                    message: SyncError::AdapterNotRegistered(server).to_string(),
                });
                continue;
            };

            let outcome = match with_timeout(
                self.engine.call_timeout(),
                server,
                "scan_library",
                adapter.scan_library(None),
            )
            .await
            {
                Ok(scan) => LibraryScanOutcome {
                    server_type: server,
                    success: scan.success,
                    message: scan.message,
                },
                Err(err) => {
                    warn!(%server, error = %err, "Library scan request failed");
                    LibraryScanOutcome {
                        server_type: server,
                        success: false,
                        message: format!("{err:#}"),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Play history merged across candidate servers, newest first
    ///
    /// Servers that fail to answer are skipped.
    pub async fn combined_play_history(&self, limit: usize) -> Vec<PlayHistoryEntry> {
        let mut entries = Vec::new();

        for server in self.execution_order(&self.candidate_servers(None)) {
            let Some(adapter) = self.adapter(server) else {
                continue;
            };
            match with_timeout(
                self.engine.call_timeout(),
                server,
                "get_play_history",
                adapter.get_play_history(None, limit),
            )
            .await
            {
                Ok(history) => entries.extend(history),
                Err(err) => warn!(%server, error = %err, "Failed to fetch play history"),
            }
        }

        entries.sort_by(|a, b| b.played_at.cmp(&a.played_at));
        entries.truncate(limit);
        entries
    }

    /// Upper bound used for every adapter call
    pub fn call_timeout(&self) -> Duration {
        self.engine.call_timeout()
    }
}

/// Turns a finished task into a result; a panicked or cancelled run
/// becomes that server's only error
fn join_result(
    server: ServerType,
    joined: Result<SyncResult, tokio::task::JoinError>,
) -> SyncResult {
    match joined {
        Ok(result) => result,
        Err(err) => {
            let msg = format!("Sync task failed: {err}");
            warn!(%server, %msg);
            SyncResult::failed(server, msg)
        }
    }
}
