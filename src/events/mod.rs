//! Per-work state streams.
//!
//! Subscribers get a stream of [`WorkState`] transitions for one work id:
//! the full history so far is replayed first, then live transitions follow
//! in order. The stream ends once the work reaches its final state (any
//! terminal state for one-time work, Cancelled for periodic work).
//!
//! Re-checks that leave a blocked job blocked are delivered again, so a
//! subscriber also observes no-op constraint evaluations.

use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::core::state::WorkState;
use crate::core::types::WorkId;

/// A consumable stream of state transitions for one piece of work.
pub struct WorkStateStream {
    rx: mpsc::UnboundedReceiver<WorkState>,
}

impl WorkStateStream {
    /// Receive the next state, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<WorkState> {
        self.rx.recv().await
    }

    /// Drain the stream to completion, returning every delivered state.
    ///
    /// Only returns once the work reaches its final state; use with a
    /// timeout if that is not guaranteed.
    pub async fn collect(mut self) -> Vec<WorkState> {
        let mut states = Vec::new();
        while let Some(state) = self.rx.recv().await {
            states.push(state);
        }
        states
    }
}

/// Registry of per-work subscribers, owned by the queue engine.
///
/// Delivery is isolated: a subscriber that went away is dropped on the
/// next send and never affects the engine or other subscribers.
#[derive(Default)]
pub(crate) struct StateObservers {
    senders: HashMap<WorkId, Vec<mpsc::UnboundedSender<WorkState>>>,
}

impl StateObservers {
    pub(crate) fn new() -> Self {
        Self {
            senders: HashMap::new(),
        }
    }

    /// Create a stream for `id`, replaying `history` into it first.
    ///
    /// If `open` is false the work has already reached its final state and
    /// the stream ends right after the replay.
    pub(crate) fn subscribe(
        &mut self,
        id: WorkId,
        history: &[WorkState],
        open: bool,
    ) -> WorkStateStream {
        let (tx, rx) = mpsc::unbounded_channel();
        for state in history {
            // The receiver is still in scope, so this cannot fail.
            let _ = tx.send(*state);
        }
        if open {
            self.senders.entry(id).or_default().push(tx);
        }
        WorkStateStream { rx }
    }

    /// Deliver a state to every subscriber of `id`, dropping the ones that
    /// have gone away.
    pub(crate) fn notify(&mut self, id: WorkId, state: WorkState) {
        if let Some(senders) = self.senders.get_mut(&id) {
            senders.retain(|tx| tx.send(state).is_ok());
            if senders.is_empty() {
                self.senders.remove(&id);
            }
        }
    }

    /// End every stream for `id`. Called when the work reaches its final
    /// state or is pruned.
    pub(crate) fn close(&mut self, id: WorkId) {
        self.senders.remove(&id);
    }
}
