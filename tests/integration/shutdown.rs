//! Graceful shutdown behavior.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use workq::testing::BlockingWorker;
use workq::{
    Payload, QueueState, SchedulerError, WorkContext, WorkQueue, WorkRequest, WorkState, Worker,
    WorkerError, WorkerRegistry,
};

use crate::common::{connected_signal, wait_for_state};

/// Sleeps briefly, then records that it completed.
struct SlowCompletionWorker {
    completions: AtomicUsize,
}

impl SlowCompletionWorker {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            completions: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Worker for SlowCompletionWorker {
    fn name(&self) -> &str {
        "slow-completion"
    }

    async fn run(&self, _ctx: &WorkContext) -> Result<Payload, WorkerError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.completions.fetch_add(1, Ordering::SeqCst);
        Ok(Payload::new())
    }
}

#[tokio::test]
async fn test_shutdown_waits_for_running_work() {
    let worker = SlowCompletionWorker::new();
    let (handle, task) = WorkQueue::new(WorkerRegistry::new().register(worker.clone()))
        .with_initial_signal(connected_signal())
        .start()
        .await;

    let id = handle
        .submit(WorkRequest::one_time("slow-completion").build().unwrap())
        .await
        .unwrap();
    wait_for_state(&handle, id, WorkState::Running, Duration::from_secs(2)).await;

    handle.shutdown().await.unwrap();
    let _ = task.await;

    assert_eq!(worker.completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_timeout_abandons_stuck_work() {
    let blocking = BlockingWorker::new("blocking");
    let (handle, task) = WorkQueue::new(WorkerRegistry::new().register(blocking))
        .with_initial_signal(connected_signal())
        .with_shutdown_timeout(Duration::from_millis(50))
        .start()
        .await;

    let id = handle
        .submit(WorkRequest::one_time("blocking").build().unwrap())
        .await
        .unwrap();
    wait_for_state(&handle, id, WorkState::Running, Duration::from_secs(2)).await;

    // The worker is never released; shutdown gives up after the timeout.
    let start = tokio::time::Instant::now();
    handle.shutdown().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
    let _ = task.await;
}

#[tokio::test]
async fn test_commands_fail_once_queue_is_stopped() {
    let blocking = BlockingWorker::new("blocking");
    let (handle, task) = WorkQueue::new(WorkerRegistry::new().register(blocking))
        .start()
        .await;

    assert!(handle.is_running().await);
    handle.shutdown().await.unwrap();
    let _ = task.await;
    assert_eq!(handle.state().await, QueueState::Stopped);

    let result = handle
        .submit(WorkRequest::one_time("blocking").build().unwrap())
        .await;
    assert!(matches!(result, Err(SchedulerError::ChannelError(_))));
}
