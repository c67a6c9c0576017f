//! Queue type definitions.
//!
//! Error types, state enums, the read-only work view, and the command type
//! exchanged between the handle and the engine.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::core::constraints::EnvironmentSignal;
use crate::core::payload::Payload;
use crate::core::request::{RequestError, WorkRequest};
use crate::core::state::WorkState;
use crate::core::types::WorkId;
use crate::events::WorkStateStream;
use crate::execution::RunOutcome;
use crate::storage::Snapshot;

/// Errors that can occur in the work queue.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The request failed fail-fast validation.
    #[error("invalid work request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// No worker is registered under the request's worker name.
    #[error("no worker registered under name: {0}")]
    UnknownWorker(String),

    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// State of the queue engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Engine loop is running.
    Running,
    /// Engine loop has shut down.
    Stopped,
}

/// Read-only view of a work entry.
#[derive(Debug, Clone)]
pub struct WorkInfo {
    /// Work identifier.
    pub id: WorkId,
    /// Current state.
    pub state: WorkState,
    /// Output payload from the most recent successful run.
    pub output: Option<Payload>,
    /// Failure reason from the most recent failed run.
    pub error: Option<String>,
}

/// Commands that can be sent to the queue engine.
pub(crate) enum QueueCommand {
    /// Submit a work request.
    Submit {
        request: WorkRequest,
        response: oneshot::Sender<Result<WorkId, SchedulerError>>,
    },
    /// Cancel a piece of work. Idempotent.
    Cancel {
        id: WorkId,
        response: oneshot::Sender<()>,
    },
    /// Replace the environment signal and re-evaluate blocked work.
    Signal {
        signal: EnvironmentSignal,
        response: oneshot::Sender<()>,
    },
    /// Subscribe to a work entry's state transitions.
    Subscribe {
        id: WorkId,
        response: oneshot::Sender<WorkStateStream>,
    },
    /// Query a work entry's current state and output.
    Info {
        id: WorkId,
        response: oneshot::Sender<Option<WorkInfo>>,
    },
    /// Export the work table.
    Snapshot { response: oneshot::Sender<Snapshot> },
    /// A spawned run finished. Internal.
    RunFinished { id: WorkId, outcome: RunOutcome },
    /// Shut the engine down.
    Shutdown { response: oneshot::Sender<()> },
}
