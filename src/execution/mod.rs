//! Work execution: the worker trait, the registry, and the executor that
//! runs a worker and reports the outcome.

mod executor;
mod registry;
mod worker;

pub use executor::{RunOutcome, WorkExecutor};
pub use registry::WorkerRegistry;
pub use worker::{WorkContext, Worker, WorkerError};
