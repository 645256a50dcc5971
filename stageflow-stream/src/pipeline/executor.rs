//! Cancelable execution of a stage chain.
//!
//! One execution wires every stage onto the input stream, then runs two
//! tasks of its own: a cancellation observer and a forwarder that copies
//! the last stage's output to the caller. The forwarder is the only writer
//! of the output stream. It closes the output after every worker of the
//! execution has exited, so a closed output means nothing is left running.

use super::builder::Wiring;
use super::state::{ExecutionState, StateCell};
use super::config::DEFAULT_PIPELINE_NAME;
use super::{ExecutorConfig, PipelineBuilder};
use crate::cancellation::{CancelGuard, CancellationToken, WorkerGroup};
use crate::errors::PipelineValidationError;
use crate::events::{self, EventSink};
use crate::observability::SpanTimer;
use crate::stages::{BoxedStage, StageScope};
use crate::stream::{channel, Stream, StreamSender};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

/// Runs `stages` over `input` and returns the output stream.
///
/// An empty stage list returns `input` unchanged. Any absent or invalid
/// stage fails the call before a single stage is wired.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns a [`PipelineValidationError`] naming the first invalid stage.
pub fn execute<V>(
    input: Stream<V>,
    cancel: &CancellationToken,
    stages: &[Option<BoxedStage<V>>],
) -> Result<Stream<V>, PipelineValidationError>
where
    V: Send + 'static,
{
    if stages.is_empty() {
        return Ok(input);
    }

    let pipeline = stages
        .iter()
        .cloned()
        .fold(PipelineBuilder::new(DEFAULT_PIPELINE_NAME), |builder, stage| {
            builder.maybe_stage(stage)
        })
        .build()?;

    Ok(pipeline.execute(input, cancel).into_stream())
}

/// A validated, reusable chain of stages from `I` to `O`.
pub struct Pipeline<I, O> {
    config: ExecutorConfig,
    wiring: Wiring<I, O>,
    stage_names: Arc<[String]>,
    event_sink: Arc<dyn EventSink>,
}

impl<I, O> Clone for Pipeline<I, O> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            wiring: Arc::clone(&self.wiring),
            stage_names: Arc::clone(&self.stage_names),
            event_sink: Arc::clone(&self.event_sink),
        }
    }
}

impl<I, O> Pipeline<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub(crate) fn new(
        config: ExecutorConfig,
        wiring: Wiring<I, O>,
        stage_names: Vec<String>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            wiring,
            stage_names: stage_names.into(),
            event_sink,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.config.name()
    }

    /// Returns the stage names in chain order.
    #[must_use]
    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    /// Returns the executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Starts one execution over `input`.
    ///
    /// The execution stops producing output as soon as `cancel` fires.
    /// Executions are independent; the pipeline can be run any number of
    /// times. Must be called from within a Tokio runtime.
    pub fn execute(&self, input: Stream<I>, cancel: &CancellationToken) -> Execution<O> {
        let id = Uuid::new_v4();
        let token = cancel.child();
        let workers = Arc::new(WorkerGroup::new());
        let state = Arc::new(StateCell::new());
        let lifecycle = Lifecycle {
            id,
            pipeline: self.config.name().to_string(),
            sink: self.config.emit_events.then(|| Arc::clone(&self.event_sink)),
        };
        let timer = SpanTimer::start(format!("pipeline.{}", self.config.name()));

        let scope = StageScope::new(token.clone(), Arc::clone(&workers), self.config.stage_buffering);
        let tail = (self.wiring)(input, &scope);

        info!(
            execution_id = %id,
            pipeline = %self.config.name(),
            stages = self.stage_names.len(),
            "Pipeline execution started"
        );
        lifecycle.emit(
            events::PIPELINE_STARTED,
            serde_json::json!({ "stages": self.stage_names.as_ref() }),
        );

        let (done_tx, done_rx) = oneshot::channel();
        workers.spawn(
            "cancellation-observer",
            observe_cancellation(token.clone(), Arc::clone(&state), done_rx, lifecycle.clone()),
        );

        let (tx, output) = channel(self.config.output_buffering);
        let forwarder = Forwarder {
            tail,
            tx,
            token: token.clone(),
            state: Arc::clone(&state),
            workers,
            done: done_tx,
            lifecycle,
            timer,
        };
        tokio::spawn(forwarder.run());

        Execution {
            id,
            output,
            state,
            guard: CancelGuard::new(token, "execution dropped"),
        }
    }
}

impl<I, O> std::fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.config.name())
            .field("stages", &self.stage_names)
            .finish()
    }
}

/// A running pipeline execution and its output stream.
///
/// Dropping the execution cancels it; its workers unwind on their own.
pub struct Execution<O> {
    id: Uuid,
    output: Stream<O>,
    state: Arc<StateCell>,
    guard: CancelGuard,
}

impl<O> Execution<O> {
    /// Returns the execution id used in logs and events.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.state.get()
    }

    /// Returns true if the execution observed its cancellation signal.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.state.was_cancelled()
    }

    /// Reads the next output value, or `None` once the execution is closed.
    pub async fn recv(&mut self) -> Option<O> {
        self.output.recv().await
    }

    /// Reads every remaining output value.
    pub async fn collect_vec(mut self) -> Vec<O> {
        let mut values = Vec::new();
        while let Some(value) = self.output.recv().await {
            values.push(value);
        }
        values
    }

    /// Detaches the output stream from the execution handle.
    ///
    /// The execution keeps running; dropping the returned stream still
    /// stops it at the next value it tries to forward.
    #[must_use]
    pub fn into_stream(self) -> Stream<O> {
        let Self {
            output, mut guard, ..
        } = self;
        guard.disarm();
        output
    }
}

impl<O> futures::Stream for Execution<O> {
    type Item = O;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<O>> {
        self.get_mut().output.poll_recv(cx)
    }
}

impl<O> std::fmt::Debug for Execution<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Identity of an execution for logs and events.
#[derive(Clone)]
struct Lifecycle {
    id: Uuid,
    pipeline: String,
    sink: Option<Arc<dyn EventSink>>,
}

impl Lifecycle {
    fn emit(&self, event_type: &str, fields: serde_json::Value) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut payload = events::with_timestamp(fields);
        if let Some(map) = payload.as_object_mut() {
            map.insert("execution_id".to_string(), self.id.to_string().into());
            map.insert("pipeline".to_string(), self.pipeline.clone().into());
        }
        sink.try_emit(event_type, Some(payload));
    }
}

/// Waits for the cancellation signal until the forwarder finishes.
async fn observe_cancellation(
    token: CancellationToken,
    state: Arc<StateCell>,
    done: oneshot::Receiver<()>,
    lifecycle: Lifecycle,
) {
    tokio::select! {
        biased;
        () = token.cancelled() => {
            state.begin_cancelling();
            let reason = token.reason().unwrap_or_default();
            info!(execution_id = %lifecycle.id, reason = %reason, "Pipeline cancellation observed");
            lifecycle.emit(events::PIPELINE_CANCELLED, serde_json::json!({ "reason": reason }));
        }
        _ = done => {}
    }
}

const OUTPUT_DROPPED: &str = "output stream dropped";

struct Forwarder<O> {
    tail: Stream<O>,
    tx: StreamSender<O>,
    token: CancellationToken,
    state: Arc<StateCell>,
    workers: Arc<WorkerGroup>,
    done: oneshot::Sender<()>,
    lifecycle: Lifecycle,
    timer: SpanTimer,
}

impl<O: Send + 'static> Forwarder<O> {
    async fn run(self) {
        let Self {
            mut tail,
            tx,
            token,
            state,
            workers,
            done,
            lifecycle,
            timer,
        } = self;
        let mut forwarded: u64 = 0;

        loop {
            let value = tokio::select! {
                biased;
                () = token.cancelled() => break,
                // A chain that filters everything never reaches the send
                // below, so the reader going away is watched here too.
                () = tx.closed() => {
                    token.cancel(OUTPUT_DROPPED);
                    break;
                }
                next = tail.recv() => match next {
                    Some(value) => value,
                    None => {
                        state.begin_draining();
                        break;
                    }
                },
            };

            // The signal may have fired while this value was being received.
            if token.is_cancelled() {
                break;
            }

            tokio::select! {
                biased;
                () = token.cancelled() => break,
                sent = tx.send(value) => {
                    if sent.is_err() {
                        token.cancel(OUTPUT_DROPPED);
                        break;
                    }
                }
            }
            forwarded += 1;
        }

        if token.is_cancelled() {
            state.begin_cancelling();
        }
        drop(tail);
        let _ = done.send(());

        debug!(execution_id = %lifecycle.id, "Waiting for stage workers");
        let panicked = workers.join_all().await;
        let cancelled = state.was_cancelled();
        state.close();

        let duration_ms = timer.finish();
        info!(
            execution_id = %lifecycle.id,
            pipeline = %lifecycle.pipeline,
            forwarded,
            cancelled,
            panicked,
            duration_ms,
            "Pipeline execution closed"
        );
        lifecycle.emit(
            events::PIPELINE_COMPLETED,
            serde_json::json!({
                "forwarded": forwarded,
                "cancelled": cancelled,
                "panicked_workers": panicked,
                "duration_ms": duration_ms,
            }),
        );

        // Closing the output is the last thing an execution does.
        drop(tx);
    }
}
