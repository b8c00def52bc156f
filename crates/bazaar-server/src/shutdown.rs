//! Graceful shutdown of the hub's background tasks via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default grace period before remaining tasks are aborted.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// What happened to the tracked tasks during shutdown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: usize,
    pub aborted: usize,
}

/// Owns the shared cancellation token and the tasks that observe it.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Track a task so shutdown waits for it.
    pub fn track(&mut self, name: &'static str, task: JoinHandle<()>) {
        self.tasks.push((name, task));
    }

    /// Cancel the token, wait up to `timeout` for every tracked task, then
    /// abort whatever is still running.
    pub async fn graceful_shutdown(mut self, timeout: Option<Duration>) -> ShutdownReport {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.token.cancel();
        info!(
            task_count = self.tasks.len(),
            timeout_ms = timeout.as_millis() as u64,
            "waiting for tasks to complete"
        );

        let drain = futures::future::join_all(self.tasks.iter_mut().map(|(_, task)| task));
        if tokio::time::timeout(timeout, drain).await.is_ok() {
            return ShutdownReport {
                completed: self.tasks.len(),
                aborted: 0,
            };
        }

        let mut report = ShutdownReport::default();
        for (name, task) in &self.tasks {
            if task.is_finished() {
                report.completed += 1;
            } else {
                warn!(task = name, "task did not stop in time, aborting");
                task.abort();
                report.aborted += 1;
            }
        }
        report
    }
}
