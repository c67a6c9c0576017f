//! Work request definition and builder.
//!
//! A `WorkRequest` describes a unit of deferred work: the worker to invoke,
//! its input payload, the constraints gating it, and whether it repeats.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::constraints::Constraints;
use super::payload::Payload;

/// Minimum interval for periodic work.
pub const MIN_PERIODIC_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Errors raised when a work request is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The worker name is empty.
    #[error("worker name must not be empty")]
    EmptyWorkerName,

    /// A periodic interval of zero was given.
    #[error("periodic interval must not be zero")]
    ZeroInterval,

    /// The uniqueness key is empty.
    #[error("uniqueness key must not be empty")]
    EmptyUniqueKey,

    /// A periodic interval below the queue's minimum was given.
    #[error("periodic interval {got:?} is below the minimum {min:?}")]
    PeriodTooShort { got: Duration, min: Duration },
}

/// Whether a work request runs once or repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkKind {
    /// Runs once and reaches a final state.
    OneTime,
    /// Re-admitted after `interval` elapses, forever until cancelled.
    Periodic { interval: Duration },
}

impl WorkKind {
    /// Whether this is periodic work.
    pub fn is_periodic(&self) -> bool {
        matches!(self, WorkKind::Periodic { .. })
    }

    /// The repeat interval, if periodic.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            WorkKind::OneTime => None,
            WorkKind::Periodic { interval } => Some(*interval),
        }
    }
}

/// Resolution policy when a unique periodic request collides with an
/// existing non-terminal one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExistingWorkPolicy {
    /// Keep the existing work; the new submission is a no-op that returns
    /// the existing id.
    #[default]
    Keep,
    /// Cancel the existing work and admit the new request.
    Replace,
}

/// A unit of deferred, possibly repeating, work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    worker: String,
    kind: WorkKind,
    payload: Payload,
    constraints: Constraints,
    unique_key: Option<String>,
    policy: ExistingWorkPolicy,
}

impl WorkRequest {
    /// Start building a one-time request for the named worker.
    pub fn one_time(worker: impl Into<String>) -> WorkRequestBuilder {
        WorkRequestBuilder::new(worker, WorkKind::OneTime)
    }

    /// Start building a periodic request for the named worker.
    pub fn periodic(worker: impl Into<String>, interval: Duration) -> WorkRequestBuilder {
        WorkRequestBuilder::new(worker, WorkKind::Periodic { interval })
    }

    /// Name of the worker this request invokes.
    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// One-time or periodic.
    pub fn kind(&self) -> WorkKind {
        self.kind
    }

    /// Input payload handed to the worker.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Constraints gating execution.
    pub fn constraints(&self) -> Constraints {
        self.constraints
    }

    /// Uniqueness key, if any.
    pub fn unique_key(&self) -> Option<&str> {
        self.unique_key.as_deref()
    }

    /// Resolution policy for uniqueness collisions.
    pub fn policy(&self) -> ExistingWorkPolicy {
        self.policy
    }

    /// Validate the request against the queue's minimum periodic interval.
    pub fn validate(&self, min_period: Duration) -> Result<(), RequestError> {
        if let WorkKind::Periodic { interval } = self.kind {
            if interval < min_period {
                return Err(RequestError::PeriodTooShort {
                    got: interval,
                    min: min_period,
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`WorkRequest`] with fail-fast validation.
pub struct WorkRequestBuilder {
    worker: String,
    kind: WorkKind,
    payload: Payload,
    constraints: Constraints,
    unique_key: Option<String>,
    policy: ExistingWorkPolicy,
}

impl WorkRequestBuilder {
    fn new(worker: impl Into<String>, kind: WorkKind) -> Self {
        Self {
            worker: worker.into(),
            kind,
            payload: Payload::new(),
            constraints: Constraints::none(),
            unique_key: None,
            policy: ExistingWorkPolicy::default(),
        }
    }

    /// Set the input payload.
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Set the constraints.
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Make the request unique under the given key and policy.
    pub fn unique(mut self, key: impl Into<String>, policy: ExistingWorkPolicy) -> Self {
        self.unique_key = Some(key.into());
        self.policy = policy;
        self
    }

    /// Build the request, validating its structure.
    pub fn build(self) -> Result<WorkRequest, RequestError> {
        if self.worker.is_empty() {
            return Err(RequestError::EmptyWorkerName);
        }
        if let WorkKind::Periodic { interval } = self.kind {
            if interval.is_zero() {
                return Err(RequestError::ZeroInterval);
            }
        }
        if let Some(key) = &self.unique_key {
            if key.is_empty() {
                return Err(RequestError::EmptyUniqueKey);
            }
        }

        Ok(WorkRequest {
            worker: self.worker,
            kind: self.kind,
            payload: self.payload,
            constraints: self.constraints,
            unique_key: self.unique_key,
            policy: self.policy,
        })
    }
}
