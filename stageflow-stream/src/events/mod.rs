//! Lifecycle events for observability.
//!
//! Executions report `pipeline.started`, `pipeline.cancelled` and
//! `pipeline.completed` to the [`EventSink`] configured on the pipeline.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

#[cfg(test)]
pub use sink::MockEventSink;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Emitted once the chain has been wired.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Emitted when the cancellation observer sees the signal.
pub const PIPELINE_CANCELLED: &str = "pipeline.cancelled";
/// Emitted after the completion barrier, right before the output closes.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";

/// Returns the current time as an RFC 3339 string with millisecond precision.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Adds a `timestamp` field to an object payload.
pub(crate) fn with_timestamp(fields: Value) -> Value {
    let mut map = match fields {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert("timestamp".to_string(), Value::String(iso_timestamp()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_timestamp_keeps_fields() {
        let payload = with_timestamp(serde_json::json!({"execution_id": "abc"}));
        assert_eq!(payload["execution_id"], "abc");
        assert!(payload["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_with_timestamp_wraps_scalars() {
        let payload = with_timestamp(serde_json::json!(42));
        assert_eq!(payload["data"], 42);
        assert!(payload.get("timestamp").is_some());
    }

    #[test]
    fn test_iso_timestamp_parses() {
        let ts = iso_timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
