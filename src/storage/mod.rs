//! Serialization hooks for persisting the work table.
//!
//! The queue itself implements no storage. It exports its work table as a
//! [`Snapshot`] and accepts one back on construction; where the snapshot
//! lives (file, database, nowhere) is the embedding application's concern.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::payload::Payload;
use crate::core::request::WorkRequest;
use crate::core::state::WorkState;
use crate::core::types::WorkId;

/// Errors raised while serializing or deserializing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One work entry as captured at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkRecord {
    /// Work identifier, stable across restore.
    pub id: WorkId,
    /// The original request.
    pub request: WorkRequest,
    /// State at capture time.
    pub state: WorkState,
    /// Output payload, if the work had produced one.
    pub output: Option<Payload>,
    /// Failure reason, if the most recent run failed.
    pub error: Option<String>,
}

/// A serializable export of the queue's work table.
///
/// Records appear in submission order. On restore, work captured as
/// Running is re-admitted as Enqueued (its run was interrupted), periodic
/// work is re-admitted immediately, and final states are retained
/// read-only for observers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Captured work entries, in submission order.
    pub records: Vec<WorkRecord>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new(records: Vec<WorkRecord>) -> Self {
        Self { records }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of captured records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
