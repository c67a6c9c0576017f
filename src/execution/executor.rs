//! Work execution engine.
//!
//! The `WorkExecutor` runs a worker for a single request with:
//! - Concurrency limiting via semaphore
//! - Panic capture, so a misbehaving worker surfaces as a failed run
//!   instead of tearing down the queue

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use super::worker::{WorkContext, Worker};
use crate::core::payload::Payload;

/// Outcome of running a worker once.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The worker returned normally.
    Success {
        /// Output payload the worker returned.
        output: Payload,
        /// Wall-clock duration of the run.
        duration: Duration,
    },
    /// The worker returned an error or panicked.
    Failure {
        /// Human-readable failure reason.
        reason: String,
        /// Wall-clock duration of the run.
        duration: Duration,
    },
}

impl RunOutcome {
    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }
}

/// Executor for running workers with a concurrency cap.
pub struct WorkExecutor {
    max_concurrency: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkExecutor {
    /// Create an executor allowing up to `max_concurrency` simultaneous runs.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    /// The configured concurrency cap.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Number of free execution slots.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run a worker to completion and capture the outcome.
    ///
    /// The worker runs on its own spawned task so that a panic inside it is
    /// caught and reported as a `Failure` rather than propagating.
    pub async fn execute(&self, worker: Arc<dyn Worker>, ctx: WorkContext) -> RunOutcome {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        let started = Instant::now();

        let run = tokio::spawn(async move { worker.run(&ctx).await });

        match run.await {
            Ok(Ok(output)) => RunOutcome::Success {
                output,
                duration: started.elapsed(),
            },
            Ok(Err(err)) => RunOutcome::Failure {
                reason: err.to_string(),
                duration: started.elapsed(),
            },
            Err(join_err) if join_err.is_panic() => {
                let panic = join_err.into_panic();
                let reason = if let Some(msg) = panic.downcast_ref::<&str>() {
                    format!("worker panicked: {}", msg)
                } else if let Some(msg) = panic.downcast_ref::<String>() {
                    format!("worker panicked: {}", msg)
                } else {
                    "worker panicked".to_string()
                };
                RunOutcome::Failure {
                    reason,
                    duration: started.elapsed(),
                }
            }
            Err(_) => RunOutcome::Failure {
                reason: "worker task was aborted".to_string(),
                duration: started.elapsed(),
            },
        }
    }
}

impl Default for WorkExecutor {
    fn default() -> Self {
        Self::new(4)
    }
}
