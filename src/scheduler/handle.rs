//! Queue handle for submitting and controlling work.
//!
//! The `WorkQueueHandle` is the caller-facing side of the queue: it sends
//! commands over a channel to the engine task and never touches the work
//! table directly.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};

use crate::core::constraints::EnvironmentSignal;
use crate::core::request::WorkRequest;
use crate::core::types::WorkId;
use crate::events::WorkStateStream;
use crate::storage::Snapshot;

use super::types::{QueueCommand, QueueState, SchedulerError, WorkInfo};

/// Buffer size for the command channel between handle and engine.
pub(crate) const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Handle for submitting work to and controlling a running queue.
#[derive(Clone)]
pub struct WorkQueueHandle {
    pub(crate) command_tx: mpsc::Sender<QueueCommand>,
    pub(crate) state: Arc<RwLock<QueueState>>,
}

impl WorkQueueHandle {
    /// Helper to send a command that answers with a plain value.
    async fn send_query<T>(
        &self,
        build_command: impl FnOnce(oneshot::Sender<T>) -> QueueCommand,
        operation: &str,
    ) -> Result<T, SchedulerError>
    where
        T: Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| {
                SchedulerError::ChannelError(format!("failed to send {} command", operation))
            })?;

        response_rx.await.map_err(|_| {
            SchedulerError::ChannelError(format!("failed to receive {} response", operation))
        })
    }

    /// Submit a work request. Returns the assigned work id, or the id of
    /// the kept incumbent for unique work under the Keep policy.
    pub async fn submit(&self, request: WorkRequest) -> Result<WorkId, SchedulerError> {
        self.send_query(
            |response| QueueCommand::Submit { request, response },
            "submit",
        )
        .await?
    }

    /// Cancel a piece of work.
    ///
    /// Idempotent: unknown ids and work that already reached its final
    /// state are no-ops. A running job is flagged for cooperative
    /// cancellation and its eventual result is discarded.
    pub async fn cancel(&self, id: WorkId) -> Result<(), SchedulerError> {
        self.send_query(|response| QueueCommand::Cancel { id, response }, "cancel")
            .await
    }

    /// Replace the environment signal. Blocked work is re-evaluated in
    /// submission order before this returns.
    pub async fn signal(&self, signal: EnvironmentSignal) -> Result<(), SchedulerError> {
        self.send_query(
            |response| QueueCommand::Signal { signal, response },
            "signal",
        )
        .await
    }

    /// Subscribe to a work entry's state transitions.
    ///
    /// The stream replays the entry's history first, then delivers live
    /// transitions in order, and ends once the work reaches its final
    /// state. Subscribing to an unknown id yields an empty, ended stream.
    pub async fn subscribe(&self, id: WorkId) -> Result<WorkStateStream, SchedulerError> {
        self.send_query(
            |response| QueueCommand::Subscribe { id, response },
            "subscribe",
        )
        .await
    }

    /// Get the current state and output of a work entry.
    pub async fn info(&self, id: WorkId) -> Result<Option<WorkInfo>, SchedulerError> {
        self.send_query(|response| QueueCommand::Info { id, response }, "info")
            .await
    }

    /// Export the work table as a serializable snapshot.
    pub async fn snapshot(&self) -> Result<Snapshot, SchedulerError> {
        self.send_query(|response| QueueCommand::Snapshot { response }, "snapshot")
            .await
    }

    /// Shut the queue down, waiting for running work up to the configured
    /// timeout.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.send_query(|response| QueueCommand::Shutdown { response }, "shutdown")
            .await
    }

    /// Get the current engine state.
    pub async fn state(&self) -> QueueState {
        *self.state.read().await
    }

    /// Check if the engine loop is running.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == QueueState::Running
    }
}
