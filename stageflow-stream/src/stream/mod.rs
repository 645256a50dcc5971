//! Typed point-to-point streams.
//!
//! A [`Stream`] is the read half of a single-producer/single-consumer
//! channel. It is closed once its [`StreamSender`] has been dropped and all
//! buffered values have been read.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Buffering between two consecutive pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Buffering {
    /// At most `n` values may wait in the channel before the writer blocks.
    Bounded(usize),
    /// The writer never blocks.
    Unbounded,
}

impl Default for Buffering {
    fn default() -> Self {
        Self::Bounded(1)
    }
}

impl fmt::Display for Buffering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "bounded({n})"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Returned by [`StreamSender::send`] when the reader is gone.
///
/// Carries the value that could not be delivered.
pub struct SendError<V>(pub V);

impl<V> fmt::Debug for SendError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError").finish_non_exhaustive()
    }
}

impl<V> fmt::Display for SendError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream reader has been dropped")
    }
}

impl<V> std::error::Error for SendError<V> {}

enum SenderInner<V> {
    Bounded(mpsc::Sender<V>),
    Unbounded(mpsc::UnboundedSender<V>),
}

enum ReceiverInner<V> {
    Bounded(mpsc::Receiver<V>),
    Unbounded(mpsc::UnboundedReceiver<V>),
}

/// The write half of a stream.
///
/// Dropping the sender closes the stream.
pub struct StreamSender<V> {
    inner: SenderInner<V>,
}

impl<V> StreamSender<V> {
    /// Writes a value, waiting for buffer space when the stream is bounded.
    ///
    /// # Errors
    ///
    /// Returns the value back if the reader has been dropped.
    pub async fn send(&self, value: V) -> Result<(), SendError<V>> {
        match &self.inner {
            SenderInner::Bounded(tx) => tx.send(value).await.map_err(|e| SendError(e.0)),
            SenderInner::Unbounded(tx) => tx.send(value).map_err(|e| SendError(e.0)),
        }
    }

    /// Completes once the reader has been dropped or closed.
    pub async fn closed(&self) {
        match &self.inner {
            SenderInner::Bounded(tx) => tx.closed().await,
            SenderInner::Unbounded(tx) => tx.closed().await,
        }
    }

    /// Returns true if the reader has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderInner::Bounded(tx) => tx.is_closed(),
            SenderInner::Unbounded(tx) => tx.is_closed(),
        }
    }
}

impl<V> fmt::Debug for StreamSender<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The read half of a stream.
pub struct Stream<V> {
    inner: ReceiverInner<V>,
}

impl<V> Stream<V> {
    /// Reads the next value, or `None` once the stream is closed and drained.
    pub async fn recv(&mut self) -> Option<V> {
        match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.recv().await,
            ReceiverInner::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Polls for the next value.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<V>> {
        match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.poll_recv(cx),
            ReceiverInner::Unbounded(rx) => rx.poll_recv(cx),
        }
    }

    /// Stops accepting new values. Buffered values can still be read.
    pub fn close(&mut self) {
        match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.close(),
            ReceiverInner::Unbounded(rx) => rx.close(),
        }
    }

    /// Reads every remaining value until the stream closes.
    pub async fn collect_vec(mut self) -> Vec<V> {
        let mut values = Vec::new();
        while let Some(value) = self.recv().await {
            values.push(value);
        }
        values
    }

    /// Creates an already-closed stream pre-filled with `values`.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        for value in values {
            // The receiver is alive in this scope.
            let _ = tx.send(value);
        }
        Self {
            inner: ReceiverInner::Unbounded(rx),
        }
    }

    /// Creates a closed stream with no values.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_values(std::iter::empty())
    }
}

impl<V> fmt::Debug for Stream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            ReceiverInner::Bounded(_) => "bounded",
            ReceiverInner::Unbounded(_) => "unbounded",
        };
        f.debug_struct("Stream").field("kind", &kind).finish()
    }
}

impl<V> futures::Stream for Stream<V> {
    type Item = V;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<V>> {
        self.get_mut().poll_recv(cx)
    }
}

/// Creates a connected sender/stream pair.
///
/// `Bounded(0)` is treated as `Bounded(1)`.
#[must_use]
pub fn channel<V>(buffering: Buffering) -> (StreamSender<V>, Stream<V>) {
    match buffering {
        Buffering::Bounded(n) => {
            let (tx, rx) = mpsc::channel(n.max(1));
            (
                StreamSender {
                    inner: SenderInner::Bounded(tx),
                },
                Stream {
                    inner: ReceiverInner::Bounded(rx),
                },
            )
        }
        Buffering::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                StreamSender {
                    inner: SenderInner::Unbounded(tx),
                },
                Stream {
                    inner: ReceiverInner::Unbounded(rx),
                },
            )
        }
    }
}
