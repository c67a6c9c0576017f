//! Queue engine implementation.
//!
//! The engine is responsible for:
//! - Admitting one-time and periodic work requests
//! - Resolving uniqueness for periodic work (keep or replace)
//! - Gating dispatch on the current environment signal
//! - Re-admitting periodic work after its interval elapses
//! - Tracking per-work state transitions and notifying observers
//! - Retaining finished work read-only, bounded, then pruning it
//!
//! A single tokio task owns the work table; submissions, cancellations,
//! signal updates, and run completions are all serialized through one
//! command channel, so state transitions never race.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::core::constraints::EnvironmentSignal;
use crate::core::payload::Payload;
use crate::core::request::{ExistingWorkPolicy, WorkRequest, MIN_PERIODIC_INTERVAL};
use crate::core::state::WorkState;
use crate::core::types::WorkId;
use crate::events::{StateObservers, WorkStateStream};
use crate::execution::{RunOutcome, WorkContext, WorkExecutor, WorkerRegistry};
use crate::storage::{Snapshot, WorkRecord};

use super::handle::{WorkQueueHandle, COMMAND_CHANNEL_BUFFER};
use super::types::{QueueCommand, QueueState, SchedulerError, WorkInfo};

/// Cap on per-work history kept for replay to late subscribers. Periodic
/// work cycles forever, so the history must not grow without bound.
const MAX_HISTORY: usize = 64;

/// One entry in the work table.
struct WorkEntry {
    request: WorkRequest,
    state: WorkState,
    output: Option<Payload>,
    error: Option<String>,
    history: Vec<WorkState>,
    /// Submission order, used for FIFO dispatch and pruning.
    seq: u64,
    /// When a periodic entry becomes due for re-admission.
    due_at: Option<Instant>,
    /// Set when the entry can never run again, e.g. its worker is missing
    /// from the registry. Makes a Failed periodic entry final so it does
    /// not hold its uniqueness key or escape pruning.
    unrunnable: bool,
}

impl WorkEntry {
    /// Whether the entry has reached its final state: any terminal state
    /// for one-time work, Cancelled or an unrunnable failure for periodic
    /// work.
    fn is_final(&self) -> bool {
        match self.state {
            WorkState::Cancelled => true,
            WorkState::Failed => self.unrunnable || !self.request.kind().is_periodic(),
            WorkState::Succeeded => !self.request.kind().is_periodic(),
            _ => false,
        }
    }
}

/// A run currently executing on a spawned task.
struct RunningWork {
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

/// Builder for a work queue.
pub struct WorkQueue {
    registry: Arc<WorkerRegistry>,
    executor: Arc<WorkExecutor>,
    initial_signal: EnvironmentSignal,
    min_period: Duration,
    tick_interval: Duration,
    retention_limit: usize,
    shutdown_timeout: Duration,
    snapshot: Option<Snapshot>,
}

impl WorkQueue {
    /// Create a queue over the given worker registry.
    pub fn new(registry: WorkerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            executor: Arc::new(WorkExecutor::default()),
            initial_signal: EnvironmentSignal::default(),
            min_period: MIN_PERIODIC_INTERVAL,
            tick_interval: Duration::from_secs(1),
            retention_limit: 256,
            shutdown_timeout: Duration::from_secs(30),
            snapshot: None,
        }
    }

    /// Set the executor.
    pub fn with_executor(mut self, executor: WorkExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    /// Set the environment signal the queue starts with.
    pub fn with_initial_signal(mut self, signal: EnvironmentSignal) -> Self {
        self.initial_signal = signal;
        self
    }

    /// Set the minimum accepted periodic interval.
    pub fn with_min_period(mut self, min_period: Duration) -> Self {
        self.min_period = min_period;
        self
    }

    /// Set the tick interval used for periodic re-admission and pruning.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set how many finished entries are retained for observers.
    pub fn with_retention_limit(mut self, limit: usize) -> Self {
        self.retention_limit = limit;
        self
    }

    /// Set the graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Restore the work table from a snapshot on startup.
    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Start the queue and return a handle for controlling it.
    pub async fn start(self) -> (WorkQueueHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let state = Arc::new(RwLock::new(QueueState::Running));

        let handle = WorkQueueHandle {
            command_tx: command_tx.clone(),
            state: Arc::clone(&state),
        };

        let mut engine = Engine {
            registry: self.registry,
            executor: self.executor,
            signal: self.initial_signal,
            min_period: self.min_period,
            tick_interval: self.tick_interval,
            retention_limit: self.retention_limit,
            shutdown_timeout: self.shutdown_timeout,
            entries: HashMap::new(),
            unique: HashMap::new(),
            running: HashMap::new(),
            observers: StateObservers::new(),
            internal_tx: command_tx,
            next_seq: 0,
        };

        if let Some(snapshot) = self.snapshot {
            engine.restore(snapshot);
        }

        let engine_task = tokio::spawn(async move {
            engine.run(command_rx, state).await;
        });

        (handle, engine_task)
    }
}

/// The engine task that owns the work table.
struct Engine {
    registry: Arc<WorkerRegistry>,
    executor: Arc<WorkExecutor>,
    signal: EnvironmentSignal,
    min_period: Duration,
    tick_interval: Duration,
    retention_limit: usize,
    shutdown_timeout: Duration,
    entries: HashMap<WorkId, WorkEntry>,
    /// Uniqueness key to the id of the active entry holding it.
    unique: HashMap<String, WorkId>,
    running: HashMap<WorkId, RunningWork>,
    observers: StateObservers,
    /// Sender spawned runs report completion through.
    internal_tx: mpsc::Sender<QueueCommand>,
    next_seq: u64,
}

impl Engine {
    /// Main engine loop.
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<QueueCommand>,
        state: Arc<RwLock<QueueState>>,
    ) {
        let mut interval = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.check_due(Instant::now());
                    self.prune();
                }

                Some(command) = command_rx.recv() => {
                    match command {
                        QueueCommand::Submit { request, response } => {
                            let _ = response.send(self.handle_submit(request));
                        }
                        QueueCommand::Cancel { id, response } => {
                            self.handle_cancel(id);
                            let _ = response.send(());
                        }
                        QueueCommand::Signal { signal, response } => {
                            self.handle_signal(signal);
                            let _ = response.send(());
                        }
                        QueueCommand::Subscribe { id, response } => {
                            let _ = response.send(self.handle_subscribe(id));
                        }
                        QueueCommand::Info { id, response } => {
                            let _ = response.send(self.handle_info(id));
                        }
                        QueueCommand::Snapshot { response } => {
                            let _ = response.send(self.handle_snapshot());
                        }
                        QueueCommand::RunFinished { id, outcome } => {
                            self.handle_run_finished(id, outcome);
                        }
                        QueueCommand::Shutdown { response } => {
                            {
                                let mut s = state.write().await;
                                *s = QueueState::Stopped;
                            }
                            self.await_running().await;
                            let _ = response.send(());
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Transition an entry, record history, and notify observers. Closes
    /// the entry's streams once it reaches its final state.
    fn set_state(&mut self, id: WorkId, state: WorkState) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.state = state;
        if entry.history.len() >= MAX_HISTORY {
            entry.history.remove(0);
        }
        entry.history.push(state);

        let finalized = entry.is_final();
        let unique_key = if finalized {
            entry.request.unique_key().map(str::to_string)
        } else {
            None
        };

        self.observers.notify(id, state);
        if finalized {
            self.observers.close(id);
            if let Some(key) = unique_key {
                if self.unique.get(&key) == Some(&id) {
                    self.unique.remove(&key);
                }
            }
        }
    }

    fn handle_submit(&mut self, request: WorkRequest) -> Result<WorkId, SchedulerError> {
        if !self.registry.contains(request.worker()) {
            return Err(SchedulerError::UnknownWorker(request.worker().to_string()));
        }
        request.validate(self.min_period)?;

        // Uniqueness is resolved, never raised as an error.
        if let Some(key) = request.unique_key() {
            if let Some(&existing) = self.unique.get(key) {
                let active = self
                    .entries
                    .get(&existing)
                    .map(|e| !e.is_final())
                    .unwrap_or(false);
                if active {
                    match request.policy() {
                        ExistingWorkPolicy::Keep => {
                            tracing::debug!(work_id = %existing, key, "Keeping existing unique work");
                            return Ok(existing);
                        }
                        ExistingWorkPolicy::Replace => {
                            tracing::info!(work_id = %existing, key, "Replacing existing unique work");
                            self.handle_cancel(existing);
                        }
                    }
                }
            }
        }

        Ok(self.admit(request))
    }

    /// Admit a validated request: assign an id, register uniqueness, and
    /// either dispatch or block depending on the current signal.
    fn admit(&mut self, request: WorkRequest) -> WorkId {
        let id = WorkId::new();
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(key) = request.unique_key() {
            self.unique.insert(key.to_string(), id);
        }

        let constraints = request.constraints();
        let worker = request.worker().to_string();
        self.entries.insert(
            id,
            WorkEntry {
                request,
                state: WorkState::Enqueued,
                output: None,
                error: None,
                history: Vec::new(),
                seq,
                due_at: None,
                unrunnable: false,
            },
        );

        tracing::info!(work_id = %id, worker, "Work admitted");
        self.set_state(id, WorkState::Enqueued);

        if constraints.is_satisfied(&self.signal) {
            self.dispatch(id);
        } else {
            self.set_state(id, WorkState::Blocked);
        }

        id
    }

    /// Hand an eligible entry to the executor on a spawned task. The task
    /// reports back through the command channel; it never touches the
    /// work table itself.
    fn dispatch(&mut self, id: WorkId) {
        let (worker_name, payload) = match self.entries.get(&id) {
            Some(entry) => (
                entry.request.worker().to_string(),
                entry.request.payload().clone(),
            ),
            None => return,
        };

        let Some(worker) = self.registry.get(&worker_name) else {
            // The registry is checked at submit; a miss here means the
            // entry was restored against a smaller registry. The failure
            // is final, even for periodic work.
            tracing::warn!(work_id = %id, worker = worker_name, "Worker missing at dispatch");
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.error = Some(format!("no worker registered under name: {}", worker_name));
                entry.unrunnable = true;
            }
            self.set_state(id, WorkState::Failed);
            return;
        };

        self.set_state(id, WorkState::Running);
        tracing::debug!(work_id = %id, worker = worker_name, "Dispatching work");

        let ctx = WorkContext::new(payload);
        let cancel = ctx.cancel_flag();
        let executor = Arc::clone(&self.executor);
        let tx = self.internal_tx.clone();

        let handle = tokio::spawn(async move {
            let outcome = executor.execute(worker, ctx).await;
            let _ = tx.send(QueueCommand::RunFinished { id, outcome }).await;
        });

        self.running.insert(id, RunningWork { handle, cancel });
    }

    fn handle_run_finished(&mut self, id: WorkId, outcome: RunOutcome) {
        self.running.remove(&id);

        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if entry.state == WorkState::Cancelled {
            tracing::debug!(work_id = %id, "Discarding result of cancelled run");
            return;
        }

        let interval = entry.request.kind().interval();
        let next_state = match outcome {
            RunOutcome::Success { output, duration } => {
                tracing::info!(work_id = %id, ?duration, "Work succeeded");
                entry.output = Some(output);
                entry.error = None;
                WorkState::Succeeded
            }
            RunOutcome::Failure { reason, duration } => {
                tracing::warn!(work_id = %id, ?duration, reason = %reason, "Work failed");
                entry.output = None;
                entry.error = Some(reason);
                WorkState::Failed
            }
        };

        if let Some(interval) = interval {
            entry.due_at = Some(Instant::now() + interval);
        }

        self.set_state(id, next_state);
    }

    /// Cancel an entry. Idempotent: unknown ids and final entries are
    /// no-ops. A running entry is flagged for cooperative cancellation;
    /// its result is discarded when the run reports back.
    fn handle_cancel(&mut self, id: WorkId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if entry.is_final() {
            return;
        }
        entry.due_at = None;

        if let Some(run) = self.running.get(&id) {
            run.cancel.store(true, Ordering::SeqCst);
            tracing::debug!(work_id = %id, "Flagged running work for cooperative cancel");
        }

        tracing::info!(work_id = %id, "Work cancelled");
        self.set_state(id, WorkState::Cancelled);
    }

    /// Replace the environment signal and re-evaluate blocked work in
    /// submission order. Entries that stay blocked get their state
    /// re-delivered so observers see the no-op check.
    fn handle_signal(&mut self, signal: EnvironmentSignal) {
        tracing::debug!(?signal, "Environment signal updated");
        self.signal = signal;

        let mut blocked: Vec<(u64, WorkId)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.state == WorkState::Blocked)
            .map(|(id, e)| (e.seq, *id))
            .collect();
        blocked.sort_unstable();

        for (_, id) in blocked {
            let satisfied = self
                .entries
                .get(&id)
                .map(|e| e.request.constraints().is_satisfied(&self.signal))
                .unwrap_or(false);

            if satisfied {
                self.set_state(id, WorkState::Enqueued);
                self.dispatch(id);
            } else {
                self.observers.notify(id, WorkState::Blocked);
            }
        }
    }

    /// Re-admit periodic work whose interval has elapsed.
    fn check_due(&mut self, now: Instant) {
        let mut due: Vec<(u64, WorkId)> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                matches!(e.state, WorkState::Succeeded | WorkState::Failed)
                    && e.request.kind().is_periodic()
                    && e.due_at.map(|t| t <= now).unwrap_or(false)
            })
            .map(|(id, e)| (e.seq, *id))
            .collect();
        due.sort_unstable();

        for (_, id) in due {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.due_at = None;
            }
            tracing::debug!(work_id = %id, "Re-admitting periodic work");
            self.set_state(id, WorkState::Enqueued);

            let satisfied = self
                .entries
                .get(&id)
                .map(|e| e.request.constraints().is_satisfied(&self.signal))
                .unwrap_or(false);
            if satisfied {
                self.dispatch(id);
            } else {
                self.set_state(id, WorkState::Blocked);
            }
        }
    }

    /// Drop the oldest finished entries beyond the retention limit.
    fn prune(&mut self) {
        let mut finished: Vec<(u64, WorkId)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_final())
            .map(|(id, e)| (e.seq, *id))
            .collect();
        if finished.len() <= self.retention_limit {
            return;
        }
        finished.sort_unstable();

        let excess = finished.len() - self.retention_limit;
        for (_, id) in finished.into_iter().take(excess) {
            tracing::debug!(work_id = %id, "Pruning finished work");
            self.entries.remove(&id);
            self.observers.close(id);
        }
    }

    fn handle_subscribe(&mut self, id: WorkId) -> WorkStateStream {
        match self.entries.get(&id) {
            Some(entry) => {
                let open = !entry.is_final();
                let history = entry.history.clone();
                self.observers.subscribe(id, &history, open)
            }
            // Unknown or pruned id: an empty stream that ends immediately.
            None => self.observers.subscribe(id, &[], false),
        }
    }

    fn handle_info(&self, id: WorkId) -> Option<WorkInfo> {
        self.entries.get(&id).map(|entry| WorkInfo {
            id,
            state: entry.state,
            output: entry.output.clone(),
            error: entry.error.clone(),
        })
    }

    fn handle_snapshot(&self) -> Snapshot {
        let mut rows: Vec<(u64, WorkRecord)> = self
            .entries
            .iter()
            .map(|(id, entry)| {
                (
                    entry.seq,
                    WorkRecord {
                        id: *id,
                        request: entry.request.clone(),
                        state: entry.state,
                        output: entry.output.clone(),
                        error: entry.error.clone(),
                    },
                )
            })
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Snapshot::new(rows.into_iter().map(|(_, record)| record).collect())
    }

    /// Rebuild the work table from a snapshot.
    ///
    /// Final entries are retained read-only. Everything else is
    /// re-admitted: a captured Running entry's run was interrupted, and
    /// periodic entries awaiting their interval are considered due now.
    fn restore(&mut self, snapshot: Snapshot) {
        for record in snapshot.records {
            let id = record.id;
            let state = record.state;
            let seq = self.next_seq;
            self.next_seq += 1;

            let final_retained = match state {
                WorkState::Cancelled => true,
                WorkState::Succeeded | WorkState::Failed => !record.request.kind().is_periodic(),
                _ => false,
            };

            if !final_retained {
                if let Some(key) = record.request.unique_key() {
                    self.unique.insert(key.to_string(), id);
                }
            }

            let constraints = record.request.constraints();
            self.entries.insert(
                id,
                WorkEntry {
                    request: record.request,
                    state,
                    output: record.output,
                    error: record.error,
                    history: Vec::new(),
                    seq,
                    due_at: None,
                    unrunnable: false,
                },
            );

            if final_retained {
                self.set_state(id, state);
            } else {
                if state == WorkState::Running {
                    tracing::info!(work_id = %id, "Re-admitting interrupted run");
                }
                self.set_state(id, WorkState::Enqueued);
                if constraints.is_satisfied(&self.signal) {
                    self.dispatch(id);
                } else {
                    self.set_state(id, WorkState::Blocked);
                }
            }
        }
    }

    /// Wait for running work to finish, up to the shutdown timeout.
    async fn await_running(&mut self) {
        self.running.retain(|_, run| !run.handle.is_finished());
        if self.running.is_empty() {
            tracing::info!("No running work to wait for during shutdown");
            return;
        }

        tracing::info!(
            count = self.running.len(),
            timeout = ?self.shutdown_timeout,
            "Waiting for running work to finish"
        );
        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;

        loop {
            self.running.retain(|_, run| !run.handle.is_finished());
            if self.running.is_empty() {
                tracing::info!("All running work finished");
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    remaining = self.running.len(),
                    "Shutdown timeout exceeded with work still running"
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
