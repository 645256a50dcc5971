//! Pipeline builder with validation.

use super::{ExecutorConfig, Pipeline};
use crate::errors::PipelineValidationError;
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::{Stage, StageScope};
use crate::stream::Stream;
use std::sync::Arc;

/// Wires a chain of stages onto an input stream.
pub(crate) type Wiring<I, O> = Arc<dyn Fn(Stream<I>, &StageScope) -> Stream<O> + Send + Sync>;

/// Builder for creating validated pipelines.
///
/// Each call to [`PipelineBuilder::stage`] appends a stage whose input type
/// is the current output type, so a chain such as
/// `i32 -> i32 -> String` is checked at compile time. Invalid stages are
/// recorded and reported by [`PipelineBuilder::build`].
pub struct PipelineBuilder<I, O> {
    name: String,
    config: ExecutorConfig,
    wiring: Wiring<I, O>,
    stage_names: Vec<String>,
    errors: Vec<PipelineValidationError>,
    event_sink: Arc<dyn EventSink>,
}

impl<V: Send + 'static> PipelineBuilder<V, V> {
    /// Creates a new pipeline builder with no stages.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ExecutorConfig::default(),
            wiring: Arc::new(|input: Stream<V>, _scope: &StageScope| input),
            stage_names: Vec::new(),
            errors: Vec::new(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }
}

impl<I, O> PipelineBuilder<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Appends a stage to the chain.
    #[must_use]
    pub fn stage<N, S>(self, stage: S) -> PipelineBuilder<I, N>
    where
        N: Send + 'static,
        S: Stage<O, N> + 'static,
    {
        self.maybe_stage(Some(stage))
    }

    /// Appends a stage that may be absent.
    ///
    /// An absent stage makes [`PipelineBuilder::build`] fail; it is never
    /// silently skipped.
    #[must_use]
    pub fn maybe_stage<N, S>(self, stage: Option<S>) -> PipelineBuilder<I, N>
    where
        N: Send + 'static,
        S: Stage<O, N> + 'static,
    {
        let Self {
            name: pipeline_name,
            config,
            wiring: upstream,
            mut stage_names,
            mut errors,
            event_sink,
        } = self;
        let index = stage_names.len();

        let wiring: Wiring<I, N> = match stage {
            Some(stage) => {
                let name = stage.name().to_string();
                if let Err(err) = stage.validate() {
                    errors.push(err.with_index(index).with_stages(vec![name.clone()]));
                }
                stage_names.push(name);
                Arc::new(move |input: Stream<I>, scope: &StageScope| {
                    let upstream_output = upstream(input, scope);
                    stage.run(upstream_output, scope)
                })
            }
            None => {
                errors.push(PipelineValidationError::missing_stage(index));
                stage_names.push(format!("<missing:{index}>"));
                // Never wired: build() rejects the chain.
                Arc::new(|_input: Stream<I>, _scope: &StageScope| Stream::empty())
            }
        };

        PipelineBuilder {
            name: pipeline_name,
            config,
            wiring,
            stage_names,
            errors,
            event_sink,
        }
    }

    /// Replaces the executor configuration.
    ///
    /// A name set on `config` replaces the builder's name; an unset one
    /// keeps it.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or(&self.name)
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stage_names.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first recorded stage error, or an error for an invalid
    /// configuration. Nothing is spawned either way.
    pub fn build(self) -> Result<Pipeline<I, O>, PipelineValidationError> {
        let Self {
            name,
            mut config,
            wiring,
            stage_names,
            errors,
            event_sink,
        } = self;
        if let Some(first) = errors.into_iter().next() {
            return Err(first);
        }
        if config.name.is_none() {
            config.name = Some(name);
        }
        config
            .validate()
            .map_err(|e| PipelineValidationError::new(e.to_string()))?;

        Ok(Pipeline::new(config, wiring, stage_names, event_sink))
    }
}

impl<I, O> std::fmt::Debug for PipelineBuilder<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name())
            .field("stages", &self.stage_names)
            .field("errors", &self.errors.len())
            .finish()
    }
}
