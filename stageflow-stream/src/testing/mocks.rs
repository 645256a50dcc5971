//! Instrumented stages for testing.

use std::fmt::Debug;
use std::future::ready;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::stages::{spawn_worker, Stage, StageScope};
use crate::stream::Stream;

/// A stage that sleeps for a fixed delay before mapping each value.
pub struct SlowStage<I, O, F> {
    name: String,
    delay: Duration,
    func: Arc<F>,
    _phantom: PhantomData<fn(I) -> O>,
}

impl<I, O, F> SlowStage<I, O, F>
where
    F: Fn(I) -> O + Send + Sync + 'static,
{
    /// Creates a new slow stage.
    pub fn new(name: impl Into<String>, delay: Duration, func: F) -> Self {
        Self {
            name: name.into(),
            delay,
            func: Arc::new(func),
            _phantom: PhantomData,
        }
    }

    /// Returns the per-value delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<V> SlowStage<V, V, fn(V) -> V> {
    /// Creates a slow pass-through stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self {
            name: name.into(),
            delay: Duration::from_millis(ms),
            func: Arc::new(std::convert::identity as fn(V) -> V),
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Debug for SlowStage<I, O, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlowStage")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .finish()
    }
}

impl<I, O, F> Stage<I, O> for SlowStage<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: Stream<I>, scope: &StageScope) -> Stream<O> {
        let func = Arc::clone(&self.func);
        let delay = self.delay;
        spawn_worker(scope, &self.name, input, move |value| {
            let func = Arc::clone(&func);
            async move {
                tokio::time::sleep(delay).await;
                Some(func(value))
            }
        })
    }
}

#[derive(Debug, Default)]
struct Counters {
    runs: AtomicUsize,
    seen: AtomicUsize,
    live: AtomicUsize,
}

/// Decrements the live-worker count when the worker is dropped.
struct LiveWorker(Arc<Counters>);

impl LiveWorker {
    fn enter(counters: Arc<Counters>) -> Self {
        counters.live.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }

    fn record(&self) {
        self.0.seen.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A pass-through stage that records how it was used.
///
/// Clones share their counters, so a test can keep one handle while the
/// other is moved into a pipeline.
#[derive(Debug, Clone)]
pub struct RecordingStage {
    name: String,
    counters: Arc<Counters>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Number of times the stage was wired into an execution.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.counters.runs.load(Ordering::SeqCst)
    }

    /// Number of values the stage has received.
    #[must_use]
    pub fn seen(&self) -> usize {
        self.counters.seen.load(Ordering::SeqCst)
    }

    /// Number of this stage's workers that have not exited yet.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }
}

impl<V: Send + 'static> Stage<V> for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: Stream<V>, scope: &StageScope) -> Stream<V> {
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        let live = LiveWorker::enter(Arc::clone(&self.counters));
        spawn_worker(scope, &self.name, input, move |value| {
            live.record();
            ready(Some(value))
        })
    }
}
