//! Registry of named workers.
//!
//! The queue looks workers up by the name a request carries; it never
//! inspects a worker beyond invoking it.

use std::collections::HashMap;
use std::sync::Arc;

use super::worker::Worker;

/// Maps worker names to worker implementations.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    /// Register a worker under its own name, replacing any previous worker
    /// with that name.
    pub fn register(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.insert(worker.name().to_string(), worker);
        self
    }

    /// Look up a worker by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(name).cloned()
    }

    /// Whether a worker is registered under the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
