//! Snapshot capture and restore.

use std::sync::Arc;
use std::time::Duration;
use workq::testing::{BlockingWorker, EchoWorker, FlakyWorker};
use workq::{
    Constraints, NetworkType, Payload, Snapshot, WorkQueue, WorkRequest, WorkState,
    WorkerRegistry,
};

use crate::common::{connected_signal, wait_for_state};

#[tokio::test]
async fn test_blocked_work_survives_a_json_round_trip() {
    let registry = WorkerRegistry::new().register(Arc::new(EchoWorker::new("echo")));
    let (handle, task) = WorkQueue::new(registry).start().await;

    let request = WorkRequest::one_time("echo")
        .payload(Payload::new().with("inputKey", "Input Value"))
        .constraints(Constraints::none().with_network(NetworkType::Connected))
        .build()
        .unwrap();
    let id = handle.submit(request).await.unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    handle.shutdown().await.unwrap();
    let _ = task.await;

    let json = snapshot.to_json().unwrap();
    let restored = Snapshot::from_json(&json).unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored.records[0].id, id);
    assert_eq!(restored.records[0].state, WorkState::Blocked);

    // A fresh queue with a satisfying signal runs the restored work under
    // its original id.
    let registry = WorkerRegistry::new().register(Arc::new(EchoWorker::new("echo")));
    let (handle, task) = WorkQueue::new(registry)
        .with_initial_signal(connected_signal())
        .with_snapshot(restored)
        .start()
        .await;

    let info = wait_for_state(&handle, id, WorkState::Succeeded, Duration::from_secs(2)).await;
    assert_eq!(
        info.output.unwrap().get("inputKey"),
        Some("Input Value")
    );

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_interrupted_running_work_is_readmitted() {
    let blocking = BlockingWorker::new("blocking");
    let registry = WorkerRegistry::new().register(blocking.clone());
    let (handle, task) = WorkQueue::new(registry)
        .with_initial_signal(connected_signal())
        .with_shutdown_timeout(Duration::from_millis(50))
        .start()
        .await;

    let id = handle
        .submit(WorkRequest::one_time("blocking").build().unwrap())
        .await
        .unwrap();
    wait_for_state(&handle, id, WorkState::Running, Duration::from_secs(2)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.records[0].state, WorkState::Running);

    blocking.release();
    handle.shutdown().await.unwrap();
    let _ = task.await;

    // On restore the interrupted run starts over.
    let blocking = BlockingWorker::new("blocking");
    let registry = WorkerRegistry::new().register(blocking.clone());
    let (handle, task) = WorkQueue::new(registry)
        .with_initial_signal(connected_signal())
        .with_snapshot(snapshot)
        .start()
        .await;

    wait_for_state(&handle, id, WorkState::Running, Duration::from_secs(2)).await;
    blocking.release();
    wait_for_state(&handle, id, WorkState::Succeeded, Duration::from_secs(2)).await;

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_failed_work_keeps_error_across_restore() {
    let flaky = FlakyWorker::new("flaky", usize::MAX);
    let (handle, task) = WorkQueue::new(WorkerRegistry::new().register(flaky))
        .with_initial_signal(connected_signal())
        .start()
        .await;

    let id = handle
        .submit(WorkRequest::one_time("flaky").build().unwrap())
        .await
        .unwrap();
    wait_for_state(&handle, id, WorkState::Failed, Duration::from_secs(2)).await;

    let snapshot = handle.snapshot().await.unwrap();
    handle.shutdown().await.unwrap();
    let _ = task.await;

    let restored = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
    assert!(restored.records[0]
        .error
        .as_deref()
        .unwrap()
        .contains("simulated failure"));

    let flaky = FlakyWorker::new("flaky", usize::MAX);
    let (handle, task) = WorkQueue::new(WorkerRegistry::new().register(flaky))
        .with_initial_signal(connected_signal())
        .with_snapshot(restored)
        .start()
        .await;

    // The retained failure keeps its reason without running again.
    let info = handle.info(id).await.unwrap().unwrap();
    assert_eq!(info.state, WorkState::Failed);
    assert!(info.error.unwrap().contains("simulated failure"));

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_finished_one_time_work_is_retained_read_only() {
    let registry = WorkerRegistry::new().register(Arc::new(EchoWorker::new("echo")));
    let (handle, task) = WorkQueue::new(registry)
        .with_initial_signal(connected_signal())
        .start()
        .await;

    let request = WorkRequest::one_time("echo")
        .payload(Payload::new().with("inputKey", "Input Value"))
        .build()
        .unwrap();
    let id = handle.submit(request).await.unwrap();
    wait_for_state(&handle, id, WorkState::Succeeded, Duration::from_secs(2)).await;

    let snapshot = handle.snapshot().await.unwrap();
    handle.shutdown().await.unwrap();
    let _ = task.await;

    let registry = WorkerRegistry::new().register(Arc::new(EchoWorker::new("echo")));
    let (handle, task) = WorkQueue::new(registry)
        .with_initial_signal(connected_signal())
        .with_snapshot(snapshot)
        .start()
        .await;

    // The entry stays Succeeded with its output, and does not run again.
    let info = handle.info(id).await.unwrap().unwrap();
    assert_eq!(info.state, WorkState::Succeeded);
    assert_eq!(
        info.output.unwrap().get("inputKey"),
        Some("Input Value")
    );

    let stream = handle.subscribe(id).await.unwrap();
    let states = tokio::time::timeout(Duration::from_secs(2), stream.collect())
        .await
        .unwrap();
    assert_eq!(states, vec![WorkState::Succeeded]);

    handle.shutdown().await.unwrap();
    let _ = task.await;
}
