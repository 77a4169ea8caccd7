use crate::{
    lifecycle::StopSignal,
    message::Task,
    probe::Probe,
    queue::TaskReceiver,
    runnable::{Runnable, TasksGroup},
    store::Store,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Prefix for worker instance names
const WORKER_NAME_PREFIX: &str = "Worker";

/// Runs one check and writes its result back into the store.
///
/// No lock is held while the probe is in flight.
pub(crate) async fn process_task(store: &Store, probe: &dyn Probe, task: Task) {
    if !store.contains_batch(task.batch_id) {
        tracing::debug!(batch = task.batch_id, url = %task.url, "batch removed, skipping check");
        return;
    }
    let state = probe.check(&task.url).await;
    let checked_at = chrono::Utc::now();
    store.update_link_state(task.batch_id, task.link_index, state, checked_at);
    tracing::debug!(
        batch = task.batch_id,
        link = task.link_index,
        url = %task.url,
        %state,
        "link checked"
    );
}

/// Spawns `size` workers draining `tasks` until the stop signal fires.
pub fn spawn_workers(
    size: usize,
    store: Arc<Store>,
    probe: Arc<dyn Probe>,
    tasks: TaskReceiver,
    stop: StopSignal,
) -> TasksGroup {
    let mut group = TasksGroup::new("Worker Group");
    for id in 0..size.max(1) {
        group.add_task(Box::new(Worker::new(
            id,
            store.clone(),
            probe.clone(),
            tasks.clone(),
            stop.clone(),
        )));
    }
    group.run();
    group
}

/// Worker pulling tasks from the queue one at a time.
///
/// # Fields
/// * `name` - Name of the worker instance (e.g., "Worker-0").
/// * `store` - Store receiving the check results.
/// * `probe` - Capability performing the network check.
/// * `tasks` - Shared receiving end of the task queue.
/// * `stop` - Shutdown signal; once observed the worker takes no new task.
pub struct Worker {
    name: String,
    store: Arc<Store>,
    probe: Arc<dyn Probe>,
    tasks: TaskReceiver,
    stop: StopSignal,
}

impl Worker {
    pub fn new(
        id: usize,
        store: Arc<Store>,
        probe: Arc<dyn Probe>,
        tasks: TaskReceiver,
        stop: StopSignal,
    ) -> Self {
        Self {
            name: format!("{}-{}", WORKER_NAME_PREFIX, id),
            store,
            probe,
            tasks,
            stop,
        }
    }
}

#[async_trait]
impl Runnable for Worker {
    /// Loops until shutdown is observed or the queue is closed and empty.
    /// Tasks left in the queue on shutdown are drained by the controller.
    async fn run(&mut self) {
        tracing::debug!("{} started", self.name);
        loop {
            tokio::select! {
                biased;
                _ = self.stop.stopped() => {
                    tracing::debug!("{}: shutdown signal received", self.name);
                    break;
                }
                task = self.tasks.receive() => match task {
                    Some(task) => process_task(&self.store, self.probe.as_ref(), task).await,
                    None => {
                        tracing::debug!("{}: task queue closed", self.name);
                        break;
                    }
                },
            }
        }
        tracing::debug!("{} stopped", self.name);
    }

    fn name(&self) -> &str {
        &self.name
    }
}
