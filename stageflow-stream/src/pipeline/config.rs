//! Executor configuration.

use crate::errors::StageflowError;
use crate::stream::Buffering;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding [`ExecutorConfig::name`].
pub const ENV_PIPELINE_NAME: &str = "STAGEFLOW_PIPELINE_NAME";
/// Environment variable overriding [`ExecutorConfig::stage_buffering`].
pub const ENV_STAGE_BUFFER: &str = "STAGEFLOW_STAGE_BUFFER";
/// Environment variable overriding [`ExecutorConfig::output_buffering`].
pub const ENV_OUTPUT_BUFFER: &str = "STAGEFLOW_OUTPUT_BUFFER";

/// Name used when neither the configuration nor the builder sets one.
pub const DEFAULT_PIPELINE_NAME: &str = "pipeline";

/// Configuration for executing a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Pipeline name used in logs and events.
    ///
    /// When unset, a builder keeps the name it was created with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Buffering of the streams between stages.
    #[serde(default)]
    pub stage_buffering: Buffering,
    /// Buffering of the externally visible output stream.
    #[serde(default)]
    pub output_buffering: Buffering,
    /// Whether lifecycle events are sent to the event sink.
    #[serde(default = "default_emit_events")]
    pub emit_events: bool,
}

fn default_emit_events() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: None,
            stage_buffering: Buffering::default(),
            output_buffering: Buffering::default(),
            emit_events: default_emit_events(),
        }
    }
}

impl ExecutorConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the pipeline name, or [`DEFAULT_PIPELINE_NAME`] when unset.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_PIPELINE_NAME)
    }

    /// Sets the buffering between stages.
    #[must_use]
    pub fn with_stage_buffering(mut self, buffering: Buffering) -> Self {
        self.stage_buffering = buffering;
        self
    }

    /// Sets the buffering of the output stream.
    #[must_use]
    pub fn with_output_buffering(mut self, buffering: Buffering) -> Self {
        self.output_buffering = buffering;
        self
    }

    /// Enables or disables lifecycle events.
    #[must_use]
    pub fn with_events(mut self, enabled: bool) -> Self {
        self.emit_events = enabled;
        self
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the result is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, StageflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StageflowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Applies overrides from `STAGEFLOW_*` environment variables.
    ///
    /// Buffer sizes are integers; `0` selects unbounded buffering.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer size is not a number.
    pub fn with_env_overrides(self) -> Result<Self, StageflowError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, StageflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_PIPELINE_NAME) {
            self.name = Some(name);
        }
        if let Some(raw) = lookup(ENV_STAGE_BUFFER) {
            self.stage_buffering = parse_buffering(ENV_STAGE_BUFFER, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OUTPUT_BUFFER) {
            self.output_buffering = parse_buffering(ENV_OUTPUT_BUFFER, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty name or a zero-capacity bounded buffer.
    pub fn validate(&self) -> Result<(), StageflowError> {
        if self.name().trim().is_empty() {
            return Err(StageflowError::Config("pipeline name cannot be empty".to_string()));
        }
        for (field, buffering) in [
            ("stage_buffering", self.stage_buffering),
            ("output_buffering", self.output_buffering),
        ] {
            if buffering == Buffering::Bounded(0) {
                return Err(StageflowError::Config(format!(
                    "{field} must have a capacity of at least 1"
                )));
            }
        }
        Ok(())
    }
}

fn parse_buffering(key: &str, raw: &str) -> Result<Buffering, StageflowError> {
    let capacity: usize = raw
        .trim()
        .parse()
        .map_err(|_| StageflowError::Config(format!("{key} must be an integer, got '{raw}'")))?;
    Ok(if capacity == 0 {
        Buffering::Unbounded
    } else {
        Buffering::Bounded(capacity)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.name, None);
        assert_eq!(config.name(), DEFAULT_PIPELINE_NAME);
        assert_eq!(config.stage_buffering, Buffering::Bounded(1));
        assert_eq!(config.output_buffering, Buffering::Bounded(1));
        assert!(config.emit_events);
    }

    #[test]
    fn test_builder_methods() {
        let config = ExecutorConfig::new()
            .with_name("numbers")
            .with_stage_buffering(Buffering::Unbounded)
            .with_output_buffering(Buffering::Bounded(16))
            .with_events(false);

        assert_eq!(config.name(), "numbers");
        assert_eq!(config.stage_buffering, Buffering::Unbounded);
        assert_eq!(config.output_buffering, Buffering::Bounded(16));
        assert!(!config.emit_events);
    }

    #[test]
    fn test_from_json_partial() {
        let config = ExecutorConfig::from_json_str(r#"{"name": "etl", "stage_buffering": "unbounded"}"#)
            .unwrap();
        assert_eq!(config.name(), "etl");
        assert_eq!(config.stage_buffering, Buffering::Unbounded);
        assert_eq!(config.output_buffering, Buffering::Bounded(1));
    }

    #[test]
    fn test_unset_name_is_not_serialized() {
        let json = serde_json::to_value(ExecutorConfig::default()).unwrap();
        assert!(json.get("name").is_none());

        let named = serde_json::to_value(ExecutorConfig::new().with_name("pipeline")).unwrap();
        assert_eq!(named["name"], "pipeline");
    }

    #[test]
    fn test_blank_name_is_invalid() {
        let err = ExecutorConfig::new().with_name("  ").validate().unwrap_err();
        assert!(matches!(err, StageflowError::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_zero_capacity() {
        let err = ExecutorConfig::from_json_str(r#"{"output_buffering": {"bounded": 0}}"#).unwrap_err();
        assert!(matches!(err, StageflowError::Config(_)));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "from-file", "emit_events": false}}"#).unwrap();

        let config = ExecutorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.name(), "from-file");
        assert!(!config.emit_events);
    }

    #[test]
    fn test_from_missing_file() {
        let err = ExecutorConfig::from_json_file("/nonexistent/stageflow.json").unwrap_err();
        assert!(matches!(err, StageflowError::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_PIPELINE_NAME, "overridden"),
            (ENV_STAGE_BUFFER, "0"),
            (ENV_OUTPUT_BUFFER, "8"),
        ]
        .into_iter()
        .collect();

        let config = ExecutorConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.name(), "overridden");
        assert_eq!(config.stage_buffering, Buffering::Unbounded);
        assert_eq!(config.output_buffering, Buffering::Bounded(8));
    }

    #[test]
    fn test_overrides_reject_garbage() {
        let err = ExecutorConfig::default()
            .with_overrides(|key| (key == ENV_STAGE_BUFFER).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_STAGE_BUFFER));
    }
}
