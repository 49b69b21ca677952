//! Detached execution: a bounded queue drained by a fixed worker pool.
//!
//! Enqueue returns immediately so the accepting request can acknowledge
//! without waiting; each work item is drained by exactly one worker. A full
//! queue rejects the enqueue (backpressure policy: reject, see DESIGN.md).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::event_processing::{process_work_item, ProcessingContext, WorkItem};

#[derive(Clone)]
/// Public struct `TaskScheduler` used across Curator components.
pub struct TaskScheduler {
    sender: mpsc::Sender<WorkItem>,
}

impl TaskScheduler {
    /// Spawns `worker_count` drain tasks over a queue of `queue_capacity`
    /// work items and returns the enqueue handle.
    pub fn start(
        queue_capacity: usize,
        worker_count: usize,
        context: ProcessingContext,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        for worker_index in 0..worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let context = context.clone();
            tokio::spawn(async move {
                worker_loop(worker_index, receiver, context).await;
            });
        }

        Self { sender }
    }

    /// Hands a work item to the pool without waiting for it to run. Returns
    /// the item back when the queue is full or the pool is gone.
    pub fn try_enqueue(&self, item: WorkItem) -> Result<(), WorkItem> {
        self.sender.try_send(item).map_err(|error| match error {
            mpsc::error::TrySendError::Full(item) => item,
            mpsc::error::TrySendError::Closed(item) => item,
        })
    }
}

async fn worker_loop(
    worker_index: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkItem>>>,
    context: ProcessingContext,
) {
    loop {
        let item = { receiver.lock().await.recv().await };
        let Some(item) = item else {
            break;
        };
        debug!(
            worker_index,
            operation_id = item.operation_id,
            "worker picked up operation"
        );
        process_work_item(&context, item).await;
    }
}
