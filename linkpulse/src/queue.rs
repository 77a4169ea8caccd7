use crate::{error::CheckError, lifecycle::StopSignal, message::Task};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Default number of tasks buffered between submitters and workers.
pub const DEFAULT_CAPACITY: usize = 100;

// The TaskQueue is the bounded hand-off between the batch submission path and
// the worker pool. Senders are cheap to clone; the single receiver is shared by
// all workers behind an async mutex so each task is taken exactly once.
#[derive(Debug)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    stop: StopSignal,
}

impl TaskQueue {
    pub fn new(capacity: usize, stop: StopSignal) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            stop,
        }
    }

    pub fn sender(&self) -> TaskSender {
        TaskSender {
            tx: self.tx.clone(),
            stop: self.stop.clone(),
        }
    }

    pub fn receiver(&self) -> TaskReceiver {
        TaskReceiver {
            rx: self.rx.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: mpsc::Sender<Task>,
    stop: StopSignal,
}

impl TaskSender {
    /// Enqueues a task, waiting for room while the queue is full.
    ///
    /// Fails with `ShuttingDown` if shutdown has begun before or while waiting.
    pub async fn send(&self, task: Task) -> Result<(), CheckError> {
        let mut stop = self.stop.clone();
        if stop.is_stopping() {
            return Err(CheckError::ShuttingDown);
        }

        tokio::select! {
            biased;
            _ = stop.stopped() => Err(CheckError::ShuttingDown),
            sent = self.tx.send(task) => sent.map_err(|_| CheckError::ShuttingDown),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
}

impl TaskReceiver {
    /// Waits for the next task. Cancel safe: dropping the future never loses
    /// a task.
    pub async fn receive(&self) -> Option<Task> {
        let mut guard = self.rx.lock().await;
        guard.recv().await
    }

    /// Closes the queue for new tasks and returns everything still buffered.
    pub async fn close_and_drain(&self) -> Vec<Task> {
        let mut guard = self.rx.lock().await;
        guard.close();

        let mut remaining = Vec::new();
        while let Some(task) = guard.recv().await {
            remaining.push(task);
        }
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Lifecycle;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn task(batch_id: u64, link_index: usize) -> Task {
        Task {
            batch_id,
            link_index,
            url: format!("https://host-{link_index}.test"),
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let lifecycle = Lifecycle::new();
        let queue = TaskQueue::new(10, lifecycle.stop_signal());
        let sender = queue.sender();
        let receiver = queue.receiver();

        for i in 0..3 {
            sender.send(task(1, i)).await.unwrap();
        }

        for i in 0..3 {
            assert_eq!(receiver.receive().await.unwrap(), task(1, i));
        }
    }

    #[tokio::test]
    async fn test_send_rejected_after_shutdown() {
        let lifecycle = Lifecycle::new();
        let queue = TaskQueue::new(10, lifecycle.stop_signal());
        lifecycle.begin_draining();

        let err = queue.sender().send(task(1, 0)).await.unwrap_err();
        assert!(matches!(err, CheckError::ShuttingDown));
    }

    #[tokio::test]
    async fn test_blocked_send_aborts_on_shutdown() {
        let lifecycle = Lifecycle::new();
        let queue = TaskQueue::new(1, lifecycle.stop_signal());
        let sender = queue.sender();
        sender.send(task(1, 0)).await.unwrap();

        let blocked = tokio::spawn(async move { sender.send(task(1, 1)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        lifecycle.begin_draining();
        let result = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(CheckError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_close_and_drain_returns_buffered_tasks() {
        let lifecycle = Lifecycle::new();
        let queue = TaskQueue::new(10, lifecycle.stop_signal());
        let sender = queue.sender();
        for i in 0..4 {
            sender.send(task(2, i)).await.unwrap();
        }

        let drained = queue.receiver().close_and_drain().await;
        assert_eq!(drained.len(), 4);
        assert_eq!(drained[0], task(2, 0));

        assert!(matches!(
            sender.send(task(2, 9)).await,
            Err(CheckError::ShuttingDown)
        ));
    }
}
