//! Completion barrier for the tasks of one pipeline execution.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A group of related worker tasks that can be awaited as a whole.
///
/// Workers may be spawned while [`WorkerGroup::join_all`] is already
/// waiting; the barrier keeps draining until no handle is left.
#[derive(Default)]
pub struct WorkerGroup {
    /// Handles to spawned tasks, with their names.
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
    /// Total number of tasks ever spawned in the group.
    spawned: AtomicUsize,
}

impl WorkerGroup {
    /// Creates a new, empty worker group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a task in the group.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!(worker = %name, "Spawning worker");
        let handle = tokio::spawn(task);
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.handles.lock().push((name, handle));
    }

    /// Waits until every task in the group has terminated.
    ///
    /// Returns the number of tasks that panicked. Panics are logged, not
    /// propagated.
    pub async fn join_all(&self) -> usize {
        let mut panicked = 0;
        loop {
            let handles = std::mem::take(&mut *self.handles.lock());
            if handles.is_empty() {
                return panicked;
            }

            for (name, handle) in handles {
                if let Err(join_error) = handle.await {
                    panicked += 1;
                    warn!(worker = %name, "Worker terminated abnormally: {}", join_error);
                }
            }
        }
    }

    /// Returns the number of tasks not yet awaited.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns the number of tasks ever spawned.
    #[must_use]
    pub fn spawned_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for WorkerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerGroup")
            .field("pending", &self.pending_count())
            .field("spawned", &self.spawned_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_all_waits_for_every_task() {
        let group = WorkerGroup::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for delay in [30, 10, 20] {
            let counter = counter.clone();
            group.spawn(format!("sleep-{delay}"), async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(group.join_all().await, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(group.pending_count(), 0);
        assert_eq!(group.spawned_count(), 3);
    }

    #[tokio::test]
    async fn test_join_all_empty() {
        let group = WorkerGroup::new();
        assert_eq!(group.join_all().await, 0);
    }

    #[tokio::test]
    async fn test_join_all_counts_panics() {
        let group = WorkerGroup::new();
        group.spawn("ok", async {});
        group.spawn("boom", async { panic!("worker failed") });

        assert_eq!(group.join_all().await, 1);
    }

    #[tokio::test]
    async fn test_join_all_picks_up_late_spawns() {
        let group = Arc::new(WorkerGroup::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let inner_group = group.clone();
        let inner_finished = finished.clone();
        group.spawn("parent", async move {
            let finished = inner_finished.clone();
            inner_group.spawn("late", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
            inner_finished.fetch_add(1, Ordering::SeqCst);
        });

        group.join_all().await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }
}
