//! The cancel-aware worker loop shared by the built-in stages.

use super::StageScope;
use crate::stream::Stream;
use std::future::Future;
use tracing::debug;

/// Spawns one worker that drains `input` through `transform`.
///
/// Values mapped to `None` are dropped. Every await point (reading input,
/// running the transformation, writing downstream) races against the
/// scope's cancellation signal, with cancellation checked first. The
/// output stream closes when the worker exits.
pub fn spawn_worker<I, O, F, Fut>(
    scope: &StageScope,
    name: &str,
    mut input: Stream<I>,
    transform: F,
) -> Stream<O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + 'static,
    Fut: Future<Output = Option<O>> + Send + 'static,
{
    let (tx, output) = scope.channel();
    let cancel = scope.cancel_token().clone();
    let stage = name.to_string();

    scope.spawn(name, async move {
        let mut consumed = 0usize;
        let mut emitted = 0usize;

        loop {
            let value = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = input.recv() => match next {
                    Some(value) => value,
                    None => break,
                },
            };
            consumed += 1;

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                out = transform(value) => out,
            };
            let Some(out) = result else {
                continue;
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                sent = tx.send(out) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
            emitted += 1;
        }

        debug!(
            stage = %stage,
            consumed,
            emitted,
            cancelled = cancel.is_cancelled(),
            "Stage worker exited"
        );
    });

    output
}
