//! Worker trait and execution context.
//!
//! A `Worker` is the caller-supplied work function the queue invokes when a
//! request becomes eligible. Implement this trait to define what a request
//! actually does.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::core::payload::Payload;

/// Errors a worker can fail with.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The work failed with a message.
    #[error("{0}")]
    Failed(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Context handed to a worker for a single run.
///
/// Carries the request's input payload and a cooperative cancellation flag.
/// Workers that run long should poll [`WorkContext::is_cancelled`] and bail
/// out early; the queue discards the result of a cancelled run either way.
#[derive(Debug, Clone)]
pub struct WorkContext {
    payload: Payload,
    cancelled: Arc<AtomicBool>,
}

impl WorkContext {
    /// Create a context for the given input payload.
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The request's input payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Handle the queue uses to flag cancellation.
    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

/// The core trait for defining executable work.
///
/// # Example
///
/// ```ignore
/// use workq::{Payload, WorkContext, Worker, WorkerError};
/// use async_trait::async_trait;
///
/// struct Download;
///
/// #[async_trait]
/// impl Worker for Download {
///     fn name(&self) -> &str {
///         "download"
///     }
///
///     async fn run(&self, ctx: &WorkContext) -> Result<Payload, WorkerError> {
///         let url = ctx
///             .payload()
///             .get("url")
///             .ok_or_else(|| WorkerError::Failed("missing url".into()))?;
///         // ... fetch ...
///         Ok(Payload::new().with("status", "done").with("url", url))
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sync {
    /// Unique name this worker is registered under.
    fn name(&self) -> &str;

    /// Execute the work, reading inputs from the context and returning the
    /// output payload on success.
    async fn run(&self, ctx: &WorkContext) -> Result<Payload, WorkerError>;
}
