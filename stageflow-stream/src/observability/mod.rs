//! Observability utilities.

mod logging;

pub use logging::{init_tracing, LogFormat, SpanTimer, ENV_LOG_FORMAT};
