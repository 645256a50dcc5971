//! Pipeline building and execution.
//!
//! This module provides:
//! - The `execute` entry point over a homogeneous stage list
//! - A typed pipeline builder with validation
//! - Execution handles with lifecycle state
//! - Executor configuration

mod builder;
mod config;
mod executor;
mod state;

pub use builder::PipelineBuilder;
pub use config::{
    ExecutorConfig, DEFAULT_PIPELINE_NAME, ENV_OUTPUT_BUFFER, ENV_PIPELINE_NAME, ENV_STAGE_BUFFER,
};
pub use executor::{execute, Execution, Pipeline};
pub use state::ExecutionState;
