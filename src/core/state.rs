//! Work lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a submitted piece of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkState {
    /// Admitted and eligible to run.
    Enqueued,
    /// Admitted but waiting for constraints to be satisfied.
    Blocked,
    /// Currently executing in a worker.
    Running,
    /// Finished successfully. Final for one-time work; periodic work is
    /// re-admitted after its interval.
    Succeeded,
    /// Finished with an error. Final for one-time work; periodic work is
    /// re-admitted after its interval.
    Failed,
    /// Cancelled by the caller. Always final.
    Cancelled,
}

impl WorkState {
    /// Whether this state is terminal (Succeeded, Failed, or Cancelled).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkState::Succeeded | WorkState::Failed | WorkState::Cancelled
        )
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkState::Enqueued => "enqueued",
            WorkState::Blocked => "blocked",
            WorkState::Running => "running",
            WorkState::Succeeded => "succeeded",
            WorkState::Failed => "failed",
            WorkState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
