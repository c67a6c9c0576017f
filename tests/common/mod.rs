//! Common test utilities shared across integration tests.

use std::time::Duration;
use workq::{Connectivity, EnvironmentSignal, WorkId, WorkInfo, WorkQueueHandle, WorkState};

/// An environment where network constraints are satisfied.
pub fn connected_signal() -> EnvironmentSignal {
    EnvironmentSignal::new(Connectivity::Unmetered, false, 100)
}

/// An environment where everything is satisfied.
pub fn plugged_in_signal() -> EnvironmentSignal {
    EnvironmentSignal::new(Connectivity::Unmetered, true, 100)
}

/// Wait for a work entry to reach an expected state, polling the queue.
///
/// This is more reliable than fixed sleeps since execution time can vary.
/// Polls every 10ms and times out after the specified duration.
///
/// # Panics
///
/// Panics if the timeout is reached before the work reaches the expected
/// state.
pub async fn wait_for_state(
    handle: &WorkQueueHandle,
    id: WorkId,
    expected: WorkState,
    timeout: Duration,
) -> WorkInfo {
    let start = tokio::time::Instant::now();
    loop {
        if let Some(info) = handle.info(id).await.unwrap() {
            if info.state == expected {
                return info;
            }
            if start.elapsed() > timeout {
                panic!(
                    "Timeout waiting for work {} to reach {:?}, current state: {:?}",
                    id, expected, info.state
                );
            }
        } else if start.elapsed() > timeout {
            panic!("Timeout waiting for work {} to reach {:?}, entry gone", id, expected);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
