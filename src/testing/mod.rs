//! Testing utilities for users of the workq library.
//!
//! This module provides worker helpers for testing queue behavior:
//!
//! - [`EchoWorker`]: Succeeds immediately, echoing its input payload
//! - [`CountingWorker`]: Counts invocations, useful for periodic work
//! - [`FlakyWorker`]: Fails N times then succeeds
//! - [`BlockingWorker`]: Runs until cooperatively cancelled or released

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::payload::Payload;
use crate::execution::{WorkContext, Worker, WorkerError};

/// A worker that immediately succeeds, returning its input payload as
/// output.
pub struct EchoWorker {
    name: String,
}

impl EchoWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Worker for EchoWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> Result<Payload, WorkerError> {
        Ok(ctx.payload().clone())
    }
}

/// A worker that counts how many times it has run.
///
/// Useful for asserting that cancelled work never runs and that periodic
/// work runs repeatedly.
pub struct CountingWorker {
    name: String,
    invocations: AtomicUsize,
}

impl CountingWorker {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            invocations: AtomicUsize::new(0),
        })
    }

    /// Number of completed invocations so far.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for CountingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &WorkContext) -> Result<Payload, WorkerError> {
        let count = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Payload::new().with("count", count.to_string()))
    }
}

/// A worker that fails a fixed number of times, then succeeds.
pub struct FlakyWorker {
    name: String,
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyWorker {
    pub fn new(name: impl Into<String>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            failures,
            attempts: AtomicUsize::new(0),
        })
    }

    /// Total attempts so far, including failures.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for FlakyWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &WorkContext) -> Result<Payload, WorkerError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            Err(WorkerError::Failed(format!(
                "simulated failure on attempt {}",
                attempt + 1
            )))
        } else {
            Ok(Payload::new().with("attempt", (attempt + 1).to_string()))
        }
    }
}

/// A worker that polls until released or cooperatively cancelled.
///
/// Useful for holding work in the Running state while a test cancels it
/// or inspects concurrency.
pub struct BlockingWorker {
    name: String,
    released: Arc<AtomicBool>,
}

impl BlockingWorker {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Let in-flight runs complete successfully.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Worker for BlockingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> Result<Payload, WorkerError> {
        loop {
            if ctx.is_cancelled() {
                return Err(WorkerError::Failed("cancelled".into()));
            }
            if self.released.load(Ordering::SeqCst) {
                return Ok(Payload::new().with("released", "true"));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
