//! Lifecycle state shared by the controller, the submission path and the
//! workers.

use std::fmt;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Tasks are accepted and workers consume them.
    Running,
    /// Shutdown was requested; no new tasks, outstanding ones are drained.
    Draining,
    /// Terminal. The final snapshot was written or its failure reported.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Result of waiting for the worker pool during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed,
    TimedOut,
}

/// Owner side of the lifecycle state.
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Running);
        Self { tx }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Moves `Running` to `Draining`. Returns false if shutdown had already
    /// begun.
    pub fn begin_draining(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::Draining;
                true
            } else {
                false
            }
        })
    }

    pub fn mark_stopped(&self) {
        self.tx.send_replace(LifecycleState::Stopped);
    }

    pub async fn wait_stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|state| *state == LifecycleState::Stopped).await;
    }

    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer side handed to submitters and workers.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<LifecycleState>,
}

impl StopSignal {
    pub fn is_stopping(&self) -> bool {
        *self.rx.borrow() != LifecycleState::Running
    }

    /// Resolves once the lifecycle leaves `Running`, or when its owner is gone.
    pub async fn stopped(&mut self) {
        let _ = self
            .rx
            .wait_for(|state| *state != LifecycleState::Running)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_begin_draining_once() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        assert!(lifecycle.begin_draining());
        assert!(!lifecycle.begin_draining());
        assert_eq!(lifecycle.state(), LifecycleState::Draining);

        lifecycle.mark_stopped();
        assert!(!lifecycle.begin_draining());
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_signal_wakes_waiters() {
        let lifecycle = Lifecycle::new();
        let mut signal = lifecycle.stop_signal();
        assert!(!signal.is_stopping());

        let waiter = tokio::spawn(async move {
            signal.stopped().await;
            signal.is_stopping()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        lifecycle.begin_draining();

        let stopping = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(stopping);
    }

    #[tokio::test]
    async fn test_stop_signal_resolves_when_owner_dropped() {
        let lifecycle = Lifecycle::new();
        let mut signal = lifecycle.stop_signal();
        drop(lifecycle);

        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .unwrap();
    }
}
