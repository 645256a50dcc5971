//! Error types for stageflow-stream.
//!
//! Cancellation is deliberately absent: a cancelled execution is a normal,
//! early end of the output stream. Failures of individual values belong in
//! the value type flowing through the stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for stageflow-stream operations.
#[derive(Debug, Error)]
pub enum StageflowError {
    /// The stage chain is misconfigured.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// Executor configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a pipeline is built from an invalid stage sequence.
///
/// This is a programmer error detected before any value is read from the
/// input stream.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// Names of the stages involved in the error.
    pub stages: Vec<String>,
    /// Position of the first offending stage in the sequence.
    pub index: Option<usize>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            index: None,
        }
    }

    /// Error for an absent stage at `index`.
    #[must_use]
    pub fn missing_stage(index: usize) -> Self {
        Self::new(format!("Stage at position {index} is missing")).with_index(index)
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the position of the offending stage.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::Value::String(self.message.clone()));
        map.insert(
            "stages".to_string(),
            serde_json::Value::Array(
                self.stages
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        );
        if let Some(index) = self.index {
            map.insert("index".to_string(), serde_json::Value::from(index));
        }
        map
    }
}

/// Result alias for stageflow-stream operations.
pub type Result<T, E = StageflowError> = std::result::Result<T, E>;
