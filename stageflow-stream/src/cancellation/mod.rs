//! Cancellation and structured shutdown.
//!
//! This module provides:
//! - CancellationToken, a one-shot broadcast signal
//! - CancelGuard, which fires a token when dropped
//! - WorkerGroup, the completion barrier used to join pipeline workers

mod guard;
mod token;
mod worker_group;

pub use guard::CancelGuard;
pub use token::{CancelCallback, CancellationToken};
pub use worker_group::WorkerGroup;
