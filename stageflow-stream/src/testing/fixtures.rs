//! Producers and collectors for pipeline tests.

use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cancellation::CancellationToken;
use crate::stream::{channel, Buffering, Stream};

/// Spawns a producer writing `values` into a new stream, then closing it.
///
/// The stream has room for a single value, so the producer advances only
/// as fast as the pipeline reads. `delay` is slept before every value. The
/// producer stops early if the stream's reader is dropped.
pub fn feed<V, I>(values: I, delay: Duration) -> Stream<V>
where
    V: Send + 'static,
    I: IntoIterator<Item = V>,
    I::IntoIter: Send + 'static,
{
    let (tx, rx) = channel(Buffering::Bounded(1));
    let values = values.into_iter();
    tokio::spawn(async move {
        for value in values {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if tx.send(value).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Cancels `token` after `delay`.
pub fn cancel_after(token: &CancellationToken, delay: Duration) -> JoinHandle<()> {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        token.cancel(format!("cancelled after {}ms", delay.as_millis()));
    })
}

/// Collects a stream until it closes, measuring how long that took.
///
/// Uses Tokio's clock, so it works with paused time.
pub async fn collect_timed<S>(mut stream: S) -> (Vec<S::Item>, Duration)
where
    S: futures::Stream + Unpin,
{
    let start = Instant::now();
    let mut values = Vec::new();
    while let Some(value) = stream.next().await {
        values.push(value);
    }
    (values, start.elapsed())
}
