//! Execution scope handed to stages while the chain is wired.

use crate::cancellation::{CancellationToken, WorkerGroup};
use crate::stream::{channel, Buffering, Stream, StreamSender};
use std::future::Future;
use std::sync::Arc;

/// Everything a stage needs to start its workers for one execution.
///
/// Workers spawned through [`StageScope::spawn`] are joined by the executor
/// before the output stream closes.
#[derive(Debug, Clone)]
pub struct StageScope {
    cancel: CancellationToken,
    workers: Arc<WorkerGroup>,
    buffering: Buffering,
}

impl StageScope {
    /// Creates a scope bound to a cancellation token and a worker group.
    #[must_use]
    pub fn new(cancel: CancellationToken, workers: Arc<WorkerGroup>, buffering: Buffering) -> Self {
        Self {
            cancel,
            workers,
            buffering,
        }
    }

    /// Returns the execution's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true once the execution has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the buffering used for stage output streams.
    #[must_use]
    pub fn buffering(&self) -> Buffering {
        self.buffering
    }

    /// Creates a stage output stream with the configured buffering.
    #[must_use]
    pub fn channel<T>(&self) -> (StreamSender<T>, Stream<T>) {
        channel(self.buffering)
    }

    /// Spawns a worker that the executor will wait for.
    pub fn spawn<F>(&self, name: impl Into<String>, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.workers.spawn(name, worker);
    }
}
