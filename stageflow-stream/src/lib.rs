//! # Stageflow Stream
//!
//! Cancelable multi-stage streaming pipelines on top of Tokio.
//!
//! A pipeline is a chain of stages. Each stage turns an input stream into an
//! output stream and runs concurrently with its neighbours, so values flow
//! through the chain as soon as each stage is ready for them. A shared
//! cancellation token stops the whole chain:
//!
//! - **Typed chains**: each stage may change the value type
//! - **Prompt cancellation**: the output closes right after the signal fires
//! - **No leaks**: the output closes only after every stage worker has exited
//! - **Lifecycle events**: start, cancellation and completion reach an [`events::EventSink`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stageflow_stream::prelude::*;
//!
//! let pipeline = PipelineBuilder::<i32, i32>::new("numbers")
//!     .stage(FnStage::new("multiplier", |v: i32| v * 2))
//!     .stage(FnStage::new("adder", |v: i32| v + 100))
//!     .stage(FnStage::new("stringifier", |v: i32| v.to_string()))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! let output = pipeline.execute(Stream::from_values(1..=5), &cancel);
//! assert_eq!(output.collect_vec().await, ["102", "104", "106", "108", "110"]);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod stream;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancelGuard, CancellationToken};
    pub use crate::errors::{PipelineValidationError, StageflowError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        execute, Execution, ExecutionState, ExecutorConfig, Pipeline, PipelineBuilder,
    };
    pub use crate::stages::{
        AsyncFnStage, BoxedStage, FilterMapStage, FnStage, IdentityStage, Stage, StageScope,
    };
    pub use crate::stream::{Buffering, Stream, StreamSender};
}
