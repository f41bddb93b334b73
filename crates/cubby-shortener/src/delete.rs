use cubby_core::{DeleteTask, Result, SoftDeleter, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use typed_builder::TypedBuilder;

/// Tuning knobs for the background delete queue.
#[derive(Debug, Clone, TypedBuilder)]
pub struct DeleteQueueSettings {
    /// Bounded capacity of the task queue; a full queue blocks producers.
    #[builder(default = 5)]
    pub capacity: usize,
    /// How often accumulated tasks are flushed to the backend.
    #[builder(default = Duration::from_secs(1))]
    pub flush_interval: Duration,
}

impl Default for DeleteQueueSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Background pipeline that batches soft-delete tasks.
///
/// Producers enqueue one task at a time; a single consumer accumulates
/// them and flushes the whole batch on a fixed interval. Shutdown drains
/// whatever is still queued and runs one final flush before the consumer
/// exits, so an acknowledged enqueue reaches the backend unless the
/// backend rejects the batch. A failed flush is logged and its tasks are
/// dropped, never retried.
pub struct DeletePipeline {
    tx: mpsc::Sender<DeleteTask>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeletePipeline {
    /// Spawns the consumer task and returns the producer-side handle.
    pub fn start(deleter: Arc<dyn SoftDeleter>, settings: DeleteQueueSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.capacity);
        let (stop_tx, stop_rx) = oneshot::channel();
        let worker = tokio::spawn(consume(deleter, rx, stop_rx, settings.flush_interval));

        Self {
            tx,
            stop: Mutex::new(Some(stop_tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues one soft-delete task, waiting while the queue is full.
    ///
    /// Fails with [`StoreError::QueueClosed`] once shutdown has begun:
    /// the queue closes before the final flush, so no task is ever
    /// accepted and then dropped.
    pub async fn enqueue(&self, task: DeleteTask) -> Result<()> {
        self.tx.send(task).await.map_err(|_| StoreError::QueueClosed)
    }

    /// Stops the consumer after draining the queue. Safe to call more
    /// than once; later calls return immediately.
    pub async fn shutdown(&self) {
        let Some(stop) = self.stop.lock().await.take() else {
            return;
        };
        // The consumer is already gone if its task panicked.
        let _ = stop.send(());

        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(err) = worker.await {
                error!(error = %err, "delete consumer ended abnormally");
            }
        }
    }
}

async fn consume(
    deleter: Arc<dyn SoftDeleter>,
    mut rx: mpsc::Receiver<DeleteTask>,
    mut stop: oneshot::Receiver<()>,
    flush_interval: Duration,
) {
    // The first tick comes one full interval in, not immediately.
    let start = tokio::time::Instant::now() + flush_interval;
    let mut ticker = tokio::time::interval_at(start, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending = Vec::new();

    loop {
        tokio::select! {
            _ = &mut stop => {
                // A send racing the final flush must fail, not land in a
                // channel nobody reads again.
                rx.close();
                drain(&mut rx, &mut pending);
                flush(deleter.as_ref(), &mut pending).await;
                info!("delete pipeline stopped");
                return;
            }
            task = rx.recv() => {
                match task {
                    Some(task) => pending.push(task),
                    // Every producer handle dropped; same as shutdown.
                    None => {
                        flush(deleter.as_ref(), &mut pending).await;
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                drain(&mut rx, &mut pending);
                flush(deleter.as_ref(), &mut pending).await;
            }
        }
    }
}

fn drain(rx: &mut mpsc::Receiver<DeleteTask>, pending: &mut Vec<DeleteTask>) {
    while let Ok(task) = rx.try_recv() {
        pending.push(task);
    }
}

/// Applies the accumulated batch. An empty accumulator issues no write.
async fn flush(deleter: &dyn SoftDeleter, pending: &mut Vec<DeleteTask>) {
    if pending.is_empty() {
        return;
    }

    let batch = std::mem::take(pending);
    match deleter.soft_delete_batch(&batch).await {
        Ok(affected) => debug!(tasks = batch.len(), affected, "flushed delete batch"),
        Err(err) => error!(tasks = batch.len(), error = %err, "delete batch failed, tasks dropped"),
    }
}
