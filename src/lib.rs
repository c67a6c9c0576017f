//! workq - A minimal, constraint-gated background work queue.
//!
//! Work is submitted as a [`WorkRequest`] naming a registered [`Worker`],
//! optionally carrying a [`Payload`] and [`Constraints`]. The queue gates
//! dispatch on the current [`EnvironmentSignal`], runs eligible work in
//! submission order through a bounded executor, and re-admits periodic
//! work after its interval elapses. Callers observe per-work state through
//! [`WorkStateStream`]s.

pub mod core;
pub mod events;
pub mod execution;
pub mod scheduler;
pub mod storage;
pub mod testing;

pub use crate::core::constraints::{
    Connectivity, Constraints, EnvironmentSignal, NetworkType, LOW_BATTERY_PERCENT,
};
pub use crate::core::payload::Payload;
pub use crate::core::request::{
    ExistingWorkPolicy, RequestError, WorkKind, WorkRequest, WorkRequestBuilder,
    MIN_PERIODIC_INTERVAL,
};
pub use crate::core::state::WorkState;
pub use crate::core::types::WorkId;
pub use events::WorkStateStream;
pub use execution::{RunOutcome, WorkContext, WorkExecutor, Worker, WorkerError, WorkerRegistry};
pub use scheduler::{QueueState, SchedulerError, WorkInfo, WorkQueue, WorkQueueHandle};
pub use storage::{Snapshot, SnapshotError, WorkRecord};
