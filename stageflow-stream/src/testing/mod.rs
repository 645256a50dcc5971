//! Testing utilities for stageflow-stream pipelines.
//!
//! This module provides:
//! - Instrumented stages (slow, recording)
//! - Input producers and timed collectors

mod fixtures;
mod mocks;

pub use fixtures::{cancel_after, collect_timed, feed};
pub use mocks::{RecordingStage, SlowStage};
