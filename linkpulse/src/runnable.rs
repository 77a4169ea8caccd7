use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::{task::JoinHandle, time::timeout};

/// Trait for components that run as independent background tasks.
///
/// # Methods
/// * `run` - Runs the component until it decides to stop
/// * `name` - Returns the name identifier of the component
#[async_trait]
pub trait Runnable: Send {
    /// Runs the component to completion.
    async fn run(&mut self);

    /// Returns the name identifier of the component
    fn name(&self) -> &str;
}

struct NamedHandle {
    name: String,
    handle: JoinHandle<()>,
}

/// A named group of runnables spawned together and awaited together.
pub struct TasksGroup {
    name: String,
    pending: Vec<Box<dyn Runnable>>,
    handles: Vec<NamedHandle>,
}

impl TasksGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: vec![],
            handles: vec![],
        }
    }

    pub fn add_task(&mut self, task: Box<dyn Runnable>) {
        self.pending.push(task);
    }

    /// Number of spawned tasks not yet awaited.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Spawns every added task on the runtime.
    pub fn run(&mut self) {
        for mut task in self.pending.drain(..) {
            let name = task.name().to_string();
            let handle = tokio::spawn(async move {
                task.run().await;
            });
            self.handles.push(NamedHandle { name, handle });
        }
        tracing::info!("{} started with {} tasks", self.name, self.handles.len());
    }

    /// Waits for every task to finish within `group_timeout`.
    ///
    /// Tasks still running when the timeout expires are aborted. Returns true
    /// when all tasks finished on their own.
    pub async fn wait_for_shutdown(&mut self, group_timeout: Duration) -> bool {
        tracing::debug!("{} waiting for shutdown", self.name);
        let all = join_all(self.handles.iter_mut().map(|h| &mut h.handle));

        match timeout(group_timeout, all).await {
            Ok(results) => {
                for (holder, result) in self.handles.iter().zip(results) {
                    match result {
                        Ok(()) => tracing::debug!("{} shutdown complete", holder.name),
                        Err(e) => tracing::warn!("{} ended abnormally: {}", holder.name, e),
                    }
                }
                self.handles.clear();
                tracing::info!("{} shutdown complete", self.name);
                true
            }
            Err(_) => {
                tracing::warn!(
                    "{} shutdown timed out after {:?}",
                    self.name,
                    group_timeout
                );
                for holder in self.handles.drain(..) {
                    if !holder.handle.is_finished() {
                        tracing::warn!("{} did not stop in time, aborting", holder.name);
                        holder.handle.abort();
                    }
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Sleeper {
        name: String,
        delay: Duration,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Runnable for Sleeper {
        async fn run(&mut self) {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn group(delays: &[Duration], finished: &Arc<AtomicUsize>) -> TasksGroup {
        let mut group = TasksGroup::new("Test Group");
        for (i, delay) in delays.iter().enumerate() {
            group.add_task(Box::new(Sleeper {
                name: format!("Sleeper-{i}"),
                delay: *delay,
                finished: finished.clone(),
            }));
        }
        group.run();
        group
    }

    #[tokio::test]
    async fn test_all_tasks_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = group(
            &[Duration::from_millis(5), Duration::from_millis(10)],
            &finished,
        );
        assert_eq!(group.len(), 2);

        assert!(group.wait_for_shutdown(Duration::from_secs(1)).await);
        assert_eq!(finished.load(Ordering::SeqCst), 2);
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_slow_task_times_out_and_is_aborted() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = group(
            &[Duration::from_millis(1), Duration::from_secs(30)],
            &finished,
        );

        assert!(!group.wait_for_shutdown(Duration::from_millis(100)).await);
        assert!(group.is_empty());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
