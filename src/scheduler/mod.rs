//! Work queue engine.
//!
//! This module provides the queue that admits work requests, gates them on
//! environment constraints, dispatches eligible work in submission order,
//! and re-admits periodic work after its interval elapses.

mod engine;
mod handle;
mod types;

pub use engine::WorkQueue;
pub use handle::WorkQueueHandle;
pub use types::{QueueState, SchedulerError, WorkInfo};
