//! Constraint gating against environment signal changes.

use std::sync::Arc;
use std::time::Duration;
use workq::testing::EchoWorker;
use workq::{
    Connectivity, Constraints, EnvironmentSignal, NetworkType, WorkQueue, WorkRequest, WorkState,
    WorkerRegistry, LOW_BATTERY_PERCENT,
};

use crate::common::wait_for_state;

fn echo_queue() -> WorkQueue {
    WorkQueue::new(WorkerRegistry::new().register(Arc::new(EchoWorker::new("echo"))))
}

#[tokio::test]
async fn test_connected_constraint_accepts_any_network() {
    let queue = echo_queue();
    let (handle, task) = queue.start().await;

    let request = WorkRequest::one_time("echo")
        .constraints(Constraints::none().with_network(NetworkType::Connected))
        .build()
        .unwrap();
    let id = handle.submit(request).await.unwrap();

    let info = handle.info(id).await.unwrap().unwrap();
    assert_eq!(info.state, WorkState::Blocked);

    // A metered connection satisfies Connected.
    handle
        .signal(EnvironmentSignal::new(Connectivity::Metered, false, 100))
        .await
        .unwrap();
    wait_for_state(&handle, id, WorkState::Succeeded, Duration::from_secs(2)).await;

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_unmetered_constraint_rejects_metered_network() {
    let queue = echo_queue();
    let (handle, task) = queue.start().await;

    let request = WorkRequest::one_time("echo")
        .constraints(Constraints::none().with_network(NetworkType::Unmetered))
        .build()
        .unwrap();
    let id = handle.submit(request).await.unwrap();

    handle
        .signal(EnvironmentSignal::new(Connectivity::Metered, false, 100))
        .await
        .unwrap();
    let info = handle.info(id).await.unwrap().unwrap();
    assert_eq!(info.state, WorkState::Blocked);

    handle
        .signal(EnvironmentSignal::new(Connectivity::Unmetered, false, 100))
        .await
        .unwrap();
    wait_for_state(&handle, id, WorkState::Succeeded, Duration::from_secs(2)).await;

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_battery_not_low_uses_fixed_threshold() {
    // At the threshold the battery counts as low.
    let queue = echo_queue().with_initial_signal(EnvironmentSignal::new(
        Connectivity::Offline,
        false,
        LOW_BATTERY_PERCENT,
    ));
    let (handle, task) = queue.start().await;

    let request = WorkRequest::one_time("echo")
        .constraints(Constraints::none().with_battery_not_low(true))
        .build()
        .unwrap();
    let id = handle.submit(request).await.unwrap();

    let info = handle.info(id).await.unwrap().unwrap();
    assert_eq!(info.state, WorkState::Blocked);

    handle
        .signal(EnvironmentSignal::new(
            Connectivity::Offline,
            false,
            LOW_BATTERY_PERCENT + 1,
        ))
        .await
        .unwrap();
    wait_for_state(&handle, id, WorkState::Succeeded, Duration::from_secs(2)).await;

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_unconstrained_work_runs_in_any_environment() {
    let queue = echo_queue();
    let (handle, task) = queue.start().await;

    // Default signal is offline, unplugged.
    let id = handle
        .submit(WorkRequest::one_time("echo").build().unwrap())
        .await
        .unwrap();
    wait_for_state(&handle, id, WorkState::Succeeded, Duration::from_secs(2)).await;

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_blocked_work_released_in_submission_order() {
    let queue = echo_queue();
    let (handle, task) = queue.start().await;

    let submit = || async {
        handle
            .submit(
                WorkRequest::one_time("echo")
                    .constraints(Constraints::none().with_charging(true))
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap()
    };
    let first = submit().await;
    let second = submit().await;

    handle
        .signal(EnvironmentSignal::new(Connectivity::Offline, true, 100))
        .await
        .unwrap();

    // Both unblock; each observes the same release sequence.
    for id in [first, second] {
        wait_for_state(&handle, id, WorkState::Succeeded, Duration::from_secs(2)).await;
    }

    handle.shutdown().await.unwrap();
    let _ = task.await;
}
