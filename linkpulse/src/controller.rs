//! Controller module for the linkpulse link checker
//!
//! The controller is the handle every collaborator talks to. It owns the
//! store, the task queue, the worker pool and the lifecycle state, and it
//! drives the ordered shutdown: stop signal, bounded wait for the workers,
//! draining of buffered tasks, final snapshot.

use crate::config::Config;
use crate::error::CheckError;
use crate::lifecycle::{Lifecycle, LifecycleState, ShutdownOutcome};
use crate::message::{Batch, BatchId, Task};
use crate::probe::Probe;
use crate::queue::{TaskQueue, TaskReceiver, TaskSender};
use crate::runnable::TasksGroup;
use crate::snapshot::SnapshotFile;
use crate::store::Store;
use crate::worker_pool::{process_task, spawn_workers};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct Controller {
    store: Arc<Store>,
    probe: Arc<dyn Probe>,
    lifecycle: Lifecycle,
    tasks: TaskSender,
    receiver: TaskReceiver,
    workers: Mutex<Option<TasksGroup>>,
    drain_concurrency: usize,
    snapshot_file: Option<SnapshotFile>,
}

impl Controller {
    /// Creates the queue and spawns the worker pool. Must be called from
    /// within a tokio runtime.
    pub fn start(config: &Config, store: Arc<Store>, probe: Arc<dyn Probe>) -> Self {
        let lifecycle = Lifecycle::new();
        let queue = TaskQueue::new(config.queue.capacity, lifecycle.stop_signal());
        let workers = spawn_workers(
            config.worker.num_instance,
            store.clone(),
            probe.clone(),
            queue.receiver(),
            lifecycle.stop_signal(),
        );

        Self {
            store,
            probe,
            tasks: queue.sender(),
            receiver: queue.receiver(),
            lifecycle,
            workers: Mutex::new(Some(workers)),
            drain_concurrency: config.worker.num_instance.max(1),
            snapshot_file: config.storage.snapshot_path.clone().map(SnapshotFile::new),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Loads the prior snapshot into the store. Any failure is logged and the
    /// service starts with an empty store.
    pub async fn hydrate(&self) {
        let Some(file) = &self.snapshot_file else {
            return;
        };
        if let Err(e) = file.prepare().await {
            tracing::warn!(path = %file.path().display(), error = %e, "cannot create snapshot directory");
        }

        match file.load().await {
            Ok(Some(snapshot)) => match self.store.restore(snapshot) {
                Ok(()) => tracing::info!(
                    path = %file.path().display(),
                    batches = self.store.len(),
                    next_id = self.store.next_id(),
                    "previous state restored"
                ),
                Err(e) => tracing::warn!(error = %e, "cannot restore previous state, starting as first run"),
            },
            Ok(None) => tracing::info!("no previous state found, starting as first run"),
            Err(e) => tracing::warn!(error = %e, "cannot load previous state, starting as first run"),
        }
    }

    /// Creates a batch for `urls`. Nothing is stored for an empty list.
    pub fn submit_batch(&self, urls: Vec<String>) -> Result<BatchId, CheckError> {
        if urls.is_empty() {
            return Err(CheckError::InvalidInput);
        }
        Ok(self.store.create_batch(&urls))
    }

    /// Enqueues one task per link, in link order.
    pub async fn schedule_checks(&self, id: BatchId) -> Result<(), CheckError> {
        if self.lifecycle.state() != LifecycleState::Running {
            return Err(CheckError::ShuttingDown);
        }

        let batch = self.store.get_batch(id)?;
        for (link_index, link) in batch.links.into_iter().enumerate() {
            self.tasks
                .send(Task {
                    batch_id: id,
                    link_index,
                    url: link.url,
                })
                .await?;
        }
        tracing::debug!(batch = id, "checks scheduled");
        Ok(())
    }

    /// Creates a batch and schedules all of its links.
    ///
    /// Nothing is stored when the service is already shutting down. A batch
    /// whose scheduling is cut short by shutdown is removed again; results of
    /// tasks that made it into the queue are then dropped by the store.
    pub async fn submit_and_schedule(&self, urls: Vec<String>) -> Result<BatchId, CheckError> {
        if urls.is_empty() {
            return Err(CheckError::InvalidInput);
        }
        if self.lifecycle.state() != LifecycleState::Running {
            return Err(CheckError::ShuttingDown);
        }

        let id = self.submit_batch(urls)?;
        if let Err(e) = self.schedule_checks(id).await {
            if self.store.delete_batch(id).is_ok() {
                tracing::debug!(batch = id, error = %e, "scheduling aborted, batch discarded");
            }
            return Err(e);
        }
        Ok(id)
    }

    pub fn query_batch(&self, id: BatchId) -> Result<Batch, CheckError> {
        self.store.get_batch(id)
    }

    pub fn query_completion(&self, id: BatchId) -> bool {
        self.store.is_batch_completed(id)
    }

    pub fn delete_batch(&self, id: BatchId) -> Result<(), CheckError> {
        self.store.delete_batch(id)
    }

    /// Read-only view for report renderers; unknown ids are skipped.
    pub fn exportable_view(&self, ids: &[BatchId]) -> Vec<Batch> {
        self.store.batches(ids)
    }

    pub fn snapshot(&self) -> Result<Vec<u8>, CheckError> {
        self.store.save_snapshot()
    }

    pub fn restore(&self, bytes: &[u8]) -> Result<(), CheckError> {
        self.store.load_snapshot(bytes)
    }

    /// Stops accepting tasks and tells the workers to finish.
    pub fn begin_shutdown(&self) {
        if self.lifecycle.begin_draining() {
            tracing::info!("shutdown initiated, draining workers");
        }
    }

    /// Runs the remaining shutdown steps and moves to `Stopped`.
    ///
    /// `timeout` bounds the wait for the workers only. Buffered tasks are
    /// always processed and the snapshot is always attempted.
    pub async fn await_shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        self.begin_shutdown();

        let workers = self.workers.lock().await.take();
        let Some(mut workers) = workers else {
            // another caller is already running the drain
            self.lifecycle.wait_stopped().await;
            return ShutdownOutcome::Completed;
        };

        let outcome = if workers.wait_for_shutdown(timeout).await {
            ShutdownOutcome::Completed
        } else {
            tracing::warn!(?timeout, "workers did not finish in time, continuing shutdown");
            ShutdownOutcome::TimedOut
        };

        let drained = self.drain_queue().await;
        if drained > 0 {
            tracing::info!(tasks = drained, "processed remaining tasks");
        }

        self.persist().await;
        self.lifecycle.mark_stopped();
        tracing::info!("controller stopped");
        outcome
    }

    async fn drain_queue(&self) -> usize {
        let remaining = self.receiver.close_and_drain().await;
        let count = remaining.len();
        let store = self.store.as_ref();
        let probe = self.probe.as_ref();

        futures::stream::iter(remaining)
            .for_each_concurrent(self.drain_concurrency, |task| process_task(store, probe, task))
            .await;
        count
    }

    async fn persist(&self) {
        let Some(file) = &self.snapshot_file else {
            return;
        };
        match file.save(&self.store.snapshot()).await {
            Ok(()) => tracing::info!(path = %file.path().display(), "final state saved"),
            Err(e) => tracing::error!(path = %file.path().display(), error = %e, "failed to save final state"),
        }
    }
}
