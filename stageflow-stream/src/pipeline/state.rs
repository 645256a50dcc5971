//! Lifecycle of one pipeline execution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// The lifecycle state of a pipeline execution.
///
/// `Running -> {Draining | Cancelling} -> Closed`. `Cancelling` may also
/// follow `Draining`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Values are flowing through the chain.
    Running,
    /// The last stage closed its output; workers are finishing.
    Draining,
    /// The cancellation signal was observed; in-flight values are dropped.
    Cancelling,
    /// The output stream is closed and every worker has exited.
    Closed,
}

impl ExecutionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Draining => 1,
            Self::Cancelling => 2,
            Self::Closed => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            2 => Self::Cancelling,
            _ => Self::Closed,
        }
    }

    /// Returns true for the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Cancelling => write!(f, "cancelling"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Shared, lock-free holder of an [`ExecutionState`].
#[derive(Debug)]
pub(crate) struct StateCell {
    state: AtomicU8,
    cancelled: AtomicBool,
}

impl StateCell {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(ExecutionState::Running.as_u8()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub(crate) fn get(&self) -> ExecutionState {
        ExecutionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether the execution entered `Cancelling` at any point.
    pub(crate) fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Running -> Draining`. Returns false if another transition won.
    pub(crate) fn begin_draining(&self) -> bool {
        self.transition(&[ExecutionState::Running], ExecutionState::Draining)
    }

    /// `Running | Draining -> Cancelling`. Returns true on the first call.
    pub(crate) fn begin_cancelling(&self) -> bool {
        let moved = self.transition(
            &[ExecutionState::Running, ExecutionState::Draining],
            ExecutionState::Cancelling,
        );
        if moved {
            self.cancelled.store(true, Ordering::SeqCst);
        }
        moved
    }

    pub(crate) fn close(&self) {
        self.state.store(ExecutionState::Closed.as_u8(), Ordering::SeqCst);
    }

    fn transition(&self, from: &[ExecutionState], to: ExecutionState) -> bool {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if !from.iter().any(|s| s.as_u8() == current) {
                return false;
            }
            match self
                .state
                .compare_exchange(current, to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_completion_path() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ExecutionState::Running);

        assert!(cell.begin_draining());
        assert_eq!(cell.get(), ExecutionState::Draining);

        cell.close();
        assert!(cell.get().is_terminal());
        assert!(!cell.was_cancelled());
    }

    #[test]
    fn test_cancelling_dominates_draining() {
        let cell = StateCell::new();
        assert!(cell.begin_draining());
        assert!(cell.begin_cancelling());
        assert_eq!(cell.get(), ExecutionState::Cancelling);

        // Irreversible
        assert!(!cell.begin_draining());
        assert!(!cell.begin_cancelling());
        assert_eq!(cell.get(), ExecutionState::Cancelling);
    }

    #[test]
    fn test_closed_is_terminal() {
        let cell = StateCell::new();
        cell.close();

        assert!(!cell.begin_draining());
        assert!(!cell.begin_cancelling());
        assert_eq!(cell.get(), ExecutionState::Closed);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ExecutionState::Cancelling.to_string(), "cancelling");
        assert_eq!(
            serde_json::to_string(&ExecutionState::Draining).unwrap(),
            "\"draining\""
        );
    }
}
