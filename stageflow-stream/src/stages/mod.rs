//! Stage trait and implementations.
//!
//! A stage turns one stream into another. [`Stage::run`] only wires the
//! stage: it returns the output stream immediately and does the actual work
//! in workers spawned through the [`StageScope`].

mod map;
mod scope;
mod worker;

pub use map::{AsyncFnStage, FilterMapStage, FnStage, IdentityStage};
pub use scope::StageScope;
pub use worker::spawn_worker;

use crate::errors::PipelineValidationError;
use crate::stream::Stream;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for pipeline stages.
///
/// Implementations must
/// - consume their input until it closes or the scope is cancelled,
/// - close their output (drop its sender) only once nothing more will be
///   written,
/// - never emit more values than they consumed, and never reorder them.
pub trait Stage<I, O = I>: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Wires the stage onto `input` and returns its output stream.
    ///
    /// Must not block. Workers have to be spawned with
    /// [`StageScope::spawn`] so the executor can wait for them.
    fn run(&self, input: Stream<I>, scope: &StageScope) -> Stream<O>;

    /// Checks the stage configuration before any value flows.
    ///
    /// The default rejects stages with a blank name.
    fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name().trim().is_empty() {
            return Err(PipelineValidationError::new("Stage name cannot be empty"));
        }
        Ok(())
    }
}

/// A shared, type-erased stage.
pub type BoxedStage<I, O = I> = Arc<dyn Stage<I, O>>;

impl<I, O, S> Stage<I, O> for Arc<S>
where
    S: Stage<I, O> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&self, input: Stream<I>, scope: &StageScope) -> Stream<O> {
        (**self).run(input, scope)
    }

    fn validate(&self) -> Result<(), PipelineValidationError> {
        (**self).validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_is_invalid() {
        let stage = IdentityStage::new("  ");
        let err = Stage::<u8>::validate(&stage).unwrap_err();
        assert_eq!(err.message, "Stage name cannot be empty");
    }

    #[test]
    fn test_arc_delegates() {
        let stage: BoxedStage<u8> = Arc::new(IdentityStage::new("pass"));
        assert_eq!(stage.name(), "pass");
        assert!(stage.validate().is_ok());
    }
}
